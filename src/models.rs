use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analysis::FoodAnalysis;
use crate::config::Config;
use crate::image_cache::MealImageResolver;
use crate::llm::AiClient;
use crate::session::Workflow;

/* ---------- App state ---------- */
#[derive(Clone)]
pub struct AppState {
    pub ai: AiClient,
    pub images: Arc<MealImageResolver>,
    pub plan_session: Arc<Workflow<GeneratedPlan>>,
    pub analysis_session: Arc<Workflow<FoodAnalysis>>,
    pub config: Config,
}

/* ---------- Profile ---------- */

#[derive(Serialize, Deserialize, ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: &'static [Self] = &[Self::Male, Self::Female];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "男",
            Self::Female => "女",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

#[derive(Serialize, Deserialize, ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    LoseWeight,
    Maintain,
    GainMuscle,
}

impl Goal {
    pub const ALL: &'static [Self] = &[Self::LoseWeight, Self::Maintain, Self::GainMuscle];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LoseWeight => "减脂",
            Self::Maintain => "维持",
            Self::GainMuscle => "增肌",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoseWeight => "lose_weight",
            Self::Maintain => "maintain",
            Self::GainMuscle => "gain_muscle",
        }
    }
}

#[derive(Serialize, Deserialize, ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
}

impl ActivityLevel {
    pub const ALL: &'static [Self] = &[Self::Sedentary, Self::Light, Self::Moderate, Self::Active];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sedentary => "久坐不动",
            Self::Light => "轻度活动 (每周1-3次运动)",
            Self::Moderate => "中度活动 (每周3-5次运动)",
            Self::Active => "重度活动 (每周6-7次运动)",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub gender: Gender,
    pub age: u32,
    pub height: f64, // cm
    pub weight: f64, // kg
    pub activity: ActivityLevel,
    pub goal: Goal,
    #[serde(default)]
    pub excluded_ingredients: String, // e.g. "香菜, 苦瓜"
    #[serde(default)]
    pub dietary_preference: String, // e.g. "清淡, 低碳水"
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            gender: Gender::Female,
            age: 28,
            height: 162.0,
            weight: 55.0,
            activity: ActivityLevel::Sedentary,
            goal: Goal::LoseWeight,
            excluded_ingredients: String::new(),
            dietary_preference: String::new(),
        }
    }
}

impl UserProfile {
    /// Rejects values no prompt should ever carry.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=120).contains(&self.age) {
            return Err(format!("age must be between 1 and 120, got {}", self.age));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(format!("height must be positive, got {}", self.height));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!("weight must be positive, got {}", self.weight));
        }
        Ok(())
    }

    #[must_use]
    pub fn has_preferences(&self) -> bool {
        !self.excluded_ingredients.trim().is_empty() || !self.dietary_preference.trim().is_empty()
    }
}

/* ---------- Diet plan (model output) ---------- */

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub amount: String, // e.g. "50g", "1个"
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Meal {
    pub name: String,
    pub calories: f64,
    #[serde(default)]
    pub protein: String,
    #[serde(default)]
    pub carbs: String,
    #[serde(default)]
    pub fat: String,
    pub ingredients: Vec<Ingredient>,
    pub recipe_steps: Vec<String>,
    /// English keyword used only to generate the illustration. Absent means
    /// the meal is shown with the placeholder.
    #[serde(default)]
    pub visual_prompt_en: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::Breakfast => "早",
            Self::Lunch => "午",
            Self::Dinner => "晚",
            Self::Snack => "加",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Breakfast => "早餐",
            Self::Lunch => "午餐",
            Self::Dinner => "晚餐",
            Self::Snack => "加餐",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DayPlan {
    pub day: String, // "周一", "Day 1"...
    pub breakfast: Meal,
    pub lunch: Meal,
    pub dinner: Meal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snack: Option<Meal>,
    pub total_calories: f64,
}

impl DayPlan {
    pub fn meals(&self) -> impl Iterator<Item = (MealSlot, &Meal)> {
        [
            (MealSlot::Breakfast, Some(&self.breakfast)),
            (MealSlot::Lunch, Some(&self.lunch)),
            (MealSlot::Dinner, Some(&self.dinner)),
            (MealSlot::Snack, self.snack.as_ref()),
        ]
        .into_iter()
        .filter_map(|(slot, meal)| meal.map(|m| (slot, m)))
    }

    #[must_use]
    pub fn meal_calories_sum(&self) -> f64 {
        self.meals().map(|(_, m)| m.calories).sum()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DietPlan {
    pub title: String, // e.g. "东北地区秋季减脂食谱"
    pub summary: String,
    pub days: Vec<DayPlan>,
    pub shopping_list: Vec<String>,
}

impl DietPlan {
    pub fn meals(&self) -> impl Iterator<Item = &Meal> {
        self.days.iter().flat_map(|d| d.meals().map(|(_, m)| m))
    }
}

/// A plan together with the request that produced it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeneratedPlan {
    pub id: String,
    pub profile: UserProfile,
    pub plan: DietPlan,
    pub bmi: String,
    pub generated_at: String,
}

impl GeneratedPlan {
    #[must_use]
    pub fn new(profile: UserProfile, plan: DietPlan) -> Self {
        let bmi = crate::units::format_one_decimal(crate::units::bmi(profile.weight, profile.height));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            profile,
            plan,
            bmi,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
