//! Turns a [`UserProfile`] into a schema-constrained plan request and parses
//! the answer into a [`DietPlan`].

use serde_json::{Value as JsonValue, json};
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::llm::{AiClient, AiError, ModelRequest, Part};
use crate::models::{DietPlan, UserProfile};
use crate::units::plain_number;

pub const PLAN_TEMPERATURE: f32 = 0.4;
pub const PLAN_DAYS: u32 = 7;

/// Builds the instruction text. Identical profiles give identical bytes.
#[must_use]
pub fn build_plan_prompt(profile: &UserProfile) -> String {
    let mut constraints = String::new();
    if !profile.excluded_ingredients.is_empty() {
        let _ = write!(
            constraints,
            "\n- **严格忌口/不吃**: {}",
            profile.excluded_ingredients
        );
    }
    if !profile.dietary_preference.is_empty() {
        let _ = write!(
            constraints,
            "\n- **饮食偏好**: {}",
            profile.dietary_preference
        );
    }

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "请为一位中国用户生成详细的{PLAN_DAYS}天【{}】食谱。",
        profile.goal.label()
    );
    prompt.push('\n');
    let _ = writeln!(
        prompt,
        "用户档案: 性别{}, {}岁, {}cm, {}kg, 活动量: {}。{constraints}",
        profile.gender.label(),
        profile.age,
        plain_number(profile.height),
        plain_number(profile.weight),
        profile.activity.label(),
    );
    prompt.push_str(
        "\n要求：\n\
         1. **排版风格**: 内容需适配海报式排版。\n\
         2. **菜品接地气**: 必须是中国大陆常见的家常菜（如：凉拌木耳、番茄炒蛋、清蒸鲈鱼、杂粮粥等）。\n\
         3. **做法详情**: 每个菜必须包含【做法步骤】，不能只有名字。\n\
         4. **精确分量**: 食材必须有克数。\n\
         5. **视觉关键词**: visual_prompt_en 必须非常具体，例如 \"bowl of millet porridge and boiled egg\" 而不是 \"breakfast\"。\n\
         6. **采购清单**: 生成一份本周所需的全部食材采购清单。\n\
         \n\
         请返回JSON格式。",
    );
    prompt
}

fn ingredient_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "amount": { "type": "STRING" }
        },
        "required": ["name", "amount"]
    })
}

fn meal_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "calories": { "type": "NUMBER" },
            "protein": { "type": "STRING" },
            "carbs": { "type": "STRING" },
            "fat": { "type": "STRING" },
            "ingredients": { "type": "ARRAY", "items": ingredient_schema() },
            "recipe_steps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "简明扼要的烹饪步骤 (3-4步)，例如: '1. 鸡胸肉切丁焯水。2. 热锅少油炒香配料。'"
            },
            "visual_prompt_en": {
                "type": "STRING",
                "description": "Single English keyword or short phrase for the main dish. E.g. 'Steamed corn and boiled egg', 'Beef dumplings'. Used for image generation."
            }
        },
        "required": ["name", "calories", "ingredients", "visual_prompt_en", "recipe_steps"]
    })
}

fn day_plan_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "day": { "type": "STRING", "description": "Day label, e.g., 'Day 1', '周一'" },
            "breakfast": meal_schema(),
            "lunch": meal_schema(),
            "dinner": meal_schema(),
            "snack": meal_schema(),
            "total_calories": { "type": "NUMBER" }
        },
        "required": ["day", "breakfast", "lunch", "dinner", "total_calories"]
    })
}

/// Response schema handed to the model.
#[must_use]
pub fn diet_plan_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "食谱的大标题，例如 '25岁女性春季减脂食谱' 或 '高效增肌七日餐单'"
            },
            "summary": { "type": "STRING" },
            "days": { "type": "ARRAY", "items": day_plan_schema() },
            "shopping_list": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["title", "summary", "days", "shopping_list"]
    })
}

#[must_use]
pub fn plan_request(profile: &UserProfile) -> ModelRequest {
    ModelRequest {
        parts: vec![Part::Text(build_plan_prompt(profile))],
        schema: diet_plan_schema(),
        temperature: Some(PLAN_TEMPERATURE),
    }
}

/// # Errors
///
/// See [`AiError`]; nothing is retried.
pub async fn generate_plan(ai: &AiClient, profile: &UserProfile) -> Result<DietPlan, AiError> {
    let plan: DietPlan = ai.generate(&plan_request(profile)).await?;

    // Totals come from the model as-is; a mismatch is reported, never corrected.
    for day in &plan.days {
        let sum = day.meal_calories_sum();
        if (sum - day.total_calories).abs() >= 1.0 {
            warn!(
                day = %day.day,
                total = day.total_calories,
                meals = sum,
                "day total does not match meal calories"
            );
        }
    }

    info!(title = %plan.title, days = plan.days.len(), "diet plan generated");
    Ok(plan)
}
