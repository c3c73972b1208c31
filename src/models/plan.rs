use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Days, exercises and sets; edited as a whole document
    #[serde(default)]
    pub workouts: Value,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionPlan {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub daily_calories: Option<u32>,
    #[serde(default)]
    pub protein_grams: Option<u32>,
    #[serde(default)]
    pub carbs_grams: Option<u32>,
    #[serde(default)]
    pub fat_grams: Option<u32>,
    #[serde(default)]
    pub meals: Value,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementPlan {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub supplements: Value,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for WorkoutPlan {
    const TABLE: &'static str = "workout_plans";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for NutritionPlan {
    const TABLE: &'static str = "nutrition_plans";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for SupplementPlan {
    const TABLE: &'static str = "supplement_plans";

    fn id(&self) -> &str {
        &self.id
    }
}
