mod common;

use common::{StubModel, ai_with, sample_plan, sample_plan_text};
use nutrigen::llm::{AiError, Part};
use nutrigen::models::{DietPlan, Gender, Goal, UserProfile};
use nutrigen::planner::{PLAN_TEMPERATURE, build_plan_prompt, diet_plan_schema, generate_plan, plan_request};

#[test]
fn identical_profiles_give_identical_prompts() {
    let a = UserProfile {
        excluded_ingredients: "香菜, 苦瓜".into(),
        dietary_preference: "清淡".into(),
        ..UserProfile::default()
    };
    let b = a.clone();
    assert_eq!(build_plan_prompt(&a).as_bytes(), build_plan_prompt(&b).as_bytes());
}

#[test]
fn default_profile_prompt_mentions_every_field() {
    let prompt = build_plan_prompt(&UserProfile::default());
    for needle in ["28岁", "162cm", "55kg", "久坐不动", "减脂", "性别女", "7天", "请返回JSON格式。"] {
        assert!(prompt.contains(needle), "missing {needle:?} in:\n{prompt}");
    }
    assert!(!prompt.contains("严格忌口"));
    assert!(!prompt.contains("饮食偏好"));
}

#[test]
fn constraints_are_embedded_verbatim() {
    let profile = UserProfile {
        gender: Gender::Male,
        goal: Goal::GainMuscle,
        weight: 72.5,
        excluded_ingredients: "香菜, 苦瓜, 猪肉".into(),
        dietary_preference: "喜辣, 面食为主".into(),
        ..UserProfile::default()
    };
    let prompt = build_plan_prompt(&profile);
    assert!(prompt.contains("- **严格忌口/不吃**: 香菜, 苦瓜, 猪肉"));
    assert!(prompt.contains("- **饮食偏好**: 喜辣, 面食为主"));
    assert!(prompt.contains("【增肌】"));
    assert!(prompt.contains("72.5kg"));
    assert!(prompt.contains("性别男"));
}

#[test]
fn plan_request_is_schema_constrained() {
    let req = plan_request(&UserProfile::default());
    assert_eq!(req.temperature, Some(PLAN_TEMPERATURE));
    assert_eq!(req.parts.len(), 1);
    assert!(matches!(&req.parts[0], Part::Text(t) if t.contains("28岁")));
    assert_eq!(req.schema, diet_plan_schema());

    let schema = diet_plan_schema();
    assert_eq!(
        schema["required"],
        serde_json::json!(["title", "summary", "days", "shopping_list"])
    );
    let day = &schema["properties"]["days"]["items"];
    assert_eq!(
        day["required"],
        serde_json::json!(["day", "breakfast", "lunch", "dinner", "total_calories"])
    );
    let meal = &day["properties"]["breakfast"];
    assert_eq!(
        meal["required"],
        serde_json::json!(["name", "calories", "ingredients", "visual_prompt_en", "recipe_steps"])
    );
}

#[test]
fn plan_json_round_trips_without_loss() {
    let plan: DietPlan = serde_json::from_value(sample_plan()).unwrap();
    assert_eq!(plan.days.len(), 2);
    assert!(plan.days[0].snack.is_some());
    assert!(plan.days[1].snack.is_none());

    let back = serde_json::to_value(&plan).unwrap();
    assert_eq!(back, sample_plan());
}

#[test]
fn missing_days_is_rejected() {
    let mut v = sample_plan();
    v.as_object_mut().unwrap().remove("days");
    assert!(serde_json::from_value::<DietPlan>(v).is_err());
}

#[tokio::test]
async fn meal_without_visual_prompt_still_parses() {
    let mut v = sample_plan();
    v["days"][0]["lunch"].as_object_mut().unwrap().remove("visual_prompt_en");
    let model = StubModel::replying(v.to_string());
    let ai = ai_with(&model, Some("test-key"));

    let plan = generate_plan(&ai, &UserProfile::default()).await.unwrap();
    assert_eq!(plan.days[0].lunch.name, "清蒸鲈鱼配糙米");
    assert_eq!(plan.days[0].lunch.visual_prompt_en, "");
    assert_eq!(plan.days[0].breakfast.visual_prompt_en, "Oatmeal with boiled egg");
}

#[tokio::test]
async fn generates_plan_from_model_text() {
    let model = StubModel::replying(sample_plan_text());
    let ai = ai_with(&model, Some("test-key"));

    let plan = generate_plan(&ai, &UserProfile::default()).await.unwrap();
    assert_eq!(plan.title, "28岁女性秋季减脂食谱");
    assert_eq!(plan.shopping_list.len(), 3);
    assert_eq!(model.calls(), 1);

    let sent = model.last_request().unwrap();
    assert_eq!(sent.instruction(), build_plan_prompt(&UserProfile::default()));
}

#[tokio::test]
async fn totals_are_passed_through_unchanged() {
    let mut v = sample_plan();
    v["days"][0]["total_calories"] = serde_json::json!(9999);
    let model = StubModel::replying(v.to_string());
    let ai = ai_with(&model, Some("test-key"));

    let plan = generate_plan(&ai, &UserProfile::default()).await.unwrap();
    assert!((plan.days[0].total_calories - 9999.0).abs() < f64::EPSILON);
    assert!((plan.days[0].meal_calories_sum() - 1330.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn fenced_answer_is_accepted() {
    let text = format!("Here is your plan:\n```json\n{}\n```\nEnjoy!", sample_plan_text());
    let model = StubModel::replying(text);
    let ai = ai_with(&model, Some("test-key"));

    let plan = generate_plan(&ai, &UserProfile::default()).await.unwrap();
    assert_eq!(plan.days.len(), 2);
}

#[tokio::test]
async fn missing_credential_never_calls_the_model() {
    let model = StubModel::replying(sample_plan_text());
    for key in [None, Some(""), Some("   ")] {
        let ai = ai_with(&model, key);
        let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
        assert!(matches!(err, AiError::MissingCredential), "got {err:?}");
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn empty_answer_is_an_error() {
    let ai = ai_with(&StubModel::silent(), Some("k"));
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));

    let ai = ai_with(&StubModel::replying("  \n "), Some("k"));
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));
}

#[tokio::test]
async fn malformed_answer_is_an_error() {
    let mut v = sample_plan();
    v.as_object_mut().unwrap().remove("days");
    let ai = ai_with(&StubModel::replying(v.to_string()), Some("k"));
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::MalformedResponse(_)), "got {err:?}");

    let ai = ai_with(&StubModel::replying("sorry, I cannot help"), Some("k"));
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::MalformedResponse(_)));
}

#[tokio::test]
async fn transport_failure_is_reported() {
    let model = StubModel::failing();
    let ai = ai_with(&model, Some("k"));
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::Transport(_)));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(model.calls(), 1);
}

#[test]
fn profile_validation() {
    assert!(UserProfile::default().validate().is_ok());
    for bad in [
        UserProfile { age: 0, ..UserProfile::default() },
        UserProfile { age: 121, ..UserProfile::default() },
        UserProfile { height: 0.0, ..UserProfile::default() },
        UserProfile { weight: -1.0, ..UserProfile::default() },
        UserProfile { weight: f64::NAN, ..UserProfile::default() },
    ] {
        assert!(bad.validate().is_err(), "{bad:?} should be invalid");
    }
}
