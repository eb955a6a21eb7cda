use crate::error::{LossValuationError, Result};
use crate::schema::{AnimalInput, BuildingInput, EquipmentInput, ReportRequest, TerritoryInput};
use crate::utils::round_to_cents;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Report sections. The declaration order is the order sections are emitted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum DamageCategory {
    Equipment,
    Animals,
    Territories,
    Buildings,
}

impl DamageCategory {
    pub const ALL: [DamageCategory; 4] = [
        DamageCategory::Equipment,
        DamageCategory::Animals,
        DamageCategory::Territories,
        DamageCategory::Buildings,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DamageCategory::Equipment => "Equipment",
            DamageCategory::Animals => "Animals",
            DamageCategory::Territories => "Territories",
            DamageCategory::Buildings => "Buildings",
        }
    }
}

impl fmt::Display for DamageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum DamageItem {
    Equipment {
        name: String,
        quantity: f64,
        price: f64,
    },
    Animal {
        name: String,
        quantity: f64,
        price_per_unit: f64,
    },
    Territory {
        name: String,
        area_m2: f64,
        repair_price_per_m2: f64,
    },
    /// The price is the whole loss for the building; area is carried for display.
    Building {
        name: String,
        area_m2: f64,
        price: f64,
    },
}

impl DamageItem {
    pub fn category(&self) -> DamageCategory {
        match self {
            DamageItem::Equipment { .. } => DamageCategory::Equipment,
            DamageItem::Animal { .. } => DamageCategory::Animals,
            DamageItem::Territory { .. } => DamageCategory::Territories,
            DamageItem::Building { .. } => DamageCategory::Buildings,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DamageItem::Equipment { name, .. }
            | DamageItem::Animal { name, .. }
            | DamageItem::Territory { name, .. }
            | DamageItem::Building { name, .. } => name,
        }
    }

    pub fn quantity_or_area(&self) -> f64 {
        match self {
            DamageItem::Equipment { quantity, .. } | DamageItem::Animal { quantity, .. } => {
                *quantity
            }
            DamageItem::Territory { area_m2, .. } | DamageItem::Building { area_m2, .. } => {
                *area_m2
            }
        }
    }

    pub fn unit_price(&self) -> f64 {
        match self {
            DamageItem::Equipment { price, .. } | DamageItem::Building { price, .. } => *price,
            DamageItem::Animal { price_per_unit, .. } => *price_per_unit,
            DamageItem::Territory {
                repair_price_per_m2,
                ..
            } => *repair_price_per_m2,
        }
    }

    /// Line total before rounding.
    pub fn raw_total(&self) -> f64 {
        match self {
            DamageItem::Building { price, .. } => *price,
            _ => self.quantity_or_area() * self.unit_price(),
        }
    }

    /// Line total rounded to cents; this is what subtotals are built from.
    pub fn line_total(&self) -> f64 {
        round_to_cents(self.raw_total())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageLine {
    pub name: String,
    pub quantity_or_area: f64,
    pub unit_price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSection {
    pub category: DamageCategory,
    pub items: Vec<DamageLine>,
    /// Sum of the already-rounded line totals, not re-rounded
    pub subtotal: f64,
}

pub type DamageSections = BTreeMap<DamageCategory, DamageSection>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSummary {
    pub sections: DamageSections,
    pub grand_total: f64,
}

pub struct DamageAggregator;

impl DamageAggregator {
    /// Groups items into sections. A line, subtotal or grand total that leaves
    /// the finite range fails the whole aggregation.
    pub fn aggregate(items: &[DamageItem]) -> Result<DamageSummary> {
        let mut sections = DamageSections::new();

        for item in items {
            let section = sections
                .entry(item.category())
                .or_insert_with(|| DamageSection {
                    category: item.category(),
                    items: Vec::new(),
                    subtotal: 0.0,
                });

            let index = section.items.len();
            let total = item.line_total();
            if !total.is_finite() {
                return Err(overflow(item.category(), index, "total"));
            }

            section.subtotal += total;
            if !section.subtotal.is_finite() {
                return Err(overflow(item.category(), index, "subtotal"));
            }

            section.items.push(DamageLine {
                name: item.name().to_string(),
                quantity_or_area: item.quantity_or_area(),
                unit_price: item.unit_price(),
                total,
            });
        }

        let grand_total: f64 = sections.values().map(|s| s.subtotal).sum();
        if !grand_total.is_finite() {
            return Err(LossValuationError::RangeError(
                "Grand total of damages exceeds the representable range".to_string(),
            ));
        }

        for section in sections.values() {
            debug!(
                "{}: {} item(s), subtotal {:.2}",
                section.category,
                section.items.len(),
                section.subtotal
            );
        }

        Ok(DamageSummary {
            sections,
            grand_total,
        })
    }

    /// Converts the request's item lists into typed items. Any missing or
    /// non-finite field fails the whole conversion.
    pub fn items_from_request(request: &ReportRequest) -> Result<Vec<DamageItem>> {
        let mut items = Vec::with_capacity(
            request.technique.len()
                + request.animals.len()
                + request.territories.len()
                + request.buildings.len(),
        );

        for (index, input) in request.technique.iter().enumerate() {
            items.push(equipment_item(input, index)?);
        }
        for (index, input) in request.animals.iter().enumerate() {
            items.push(animal_item(input, index)?);
        }
        for (index, input) in request.territories.iter().enumerate() {
            items.push(territory_item(input, index)?);
        }
        for (index, input) in request.buildings.iter().enumerate() {
            items.push(building_item(input, index)?);
        }

        Ok(items)
    }
}

fn overflow(category: DamageCategory, index: usize, field: &'static str) -> LossValuationError {
    LossValuationError::InvalidFieldError {
        category: category.to_string(),
        index,
        field,
        details: "amount exceeds the representable range".to_string(),
    }
}

struct FieldContext {
    category: DamageCategory,
    index: usize,
}

impl FieldContext {
    fn name(&self, value: &Option<String>) -> Result<String> {
        match value.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(self.missing("name")),
        }
    }

    fn number(&self, value: Option<f64>, field: &'static str) -> Result<f64> {
        let value = value.ok_or_else(|| self.missing(field))?;
        if !value.is_finite() {
            return Err(LossValuationError::InvalidFieldError {
                category: self.category.to_string(),
                index: self.index,
                field,
                details: format!("{} is not a finite number", value),
            });
        }
        Ok(value)
    }

    fn missing(&self, field: &'static str) -> LossValuationError {
        LossValuationError::MissingFieldError {
            category: self.category.to_string(),
            index: self.index,
            field,
        }
    }
}

fn equipment_item(input: &EquipmentInput, index: usize) -> Result<DamageItem> {
    let ctx = FieldContext {
        category: DamageCategory::Equipment,
        index,
    };
    Ok(DamageItem::Equipment {
        name: ctx.name(&input.name)?,
        quantity: ctx.number(input.quantity, "quantity")?,
        price: ctx.number(input.price, "price")?,
    })
}

fn animal_item(input: &AnimalInput, index: usize) -> Result<DamageItem> {
    let ctx = FieldContext {
        category: DamageCategory::Animals,
        index,
    };
    Ok(DamageItem::Animal {
        name: ctx.name(&input.name)?,
        quantity: ctx.number(input.quantity, "quantity")?,
        price_per_unit: ctx.number(input.price_per_unit, "price_per_unit")?,
    })
}

fn territory_item(input: &TerritoryInput, index: usize) -> Result<DamageItem> {
    let ctx = FieldContext {
        category: DamageCategory::Territories,
        index,
    };
    Ok(DamageItem::Territory {
        name: ctx.name(&input.name)?,
        area_m2: ctx.number(input.area_m2, "area_m2")?,
        repair_price_per_m2: ctx.number(input.repair_price_per_m2, "repair_price_per_m2")?,
    })
}

fn building_item(input: &BuildingInput, index: usize) -> Result<DamageItem> {
    let ctx = FieldContext {
        category: DamageCategory::Buildings,
        index,
    };
    Ok(DamageItem::Building {
        name: ctx.name(&input.name)?,
        area_m2: ctx.number(input.area_m2, "area_m2")?,
        price: ctx.number(input.price, "price")?,
    })
}
