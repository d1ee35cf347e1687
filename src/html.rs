//! Server-rendered pages: the profile form and the printable plan poster.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::image_cache::{MealImage, PLACEHOLDER_IMAGE, cache_key, lazy_image_path};
use crate::models::{ActivityLevel, DayPlan, Gender, GeneratedPlan, Goal, Meal, MealSlot, UserProfile};
use crate::units::plain_number;

pub const PLAN_FAILED_ALERT: &str = "生成食谱失败，请重试。建议检查网络或API Key。";
pub const ANALYSIS_FAILED_MESSAGE: &str = "识别失败，请确保图片清晰，并包含食物。";
const FALLBACK_TITLE: &str = "定制健康食谱";
const BROKEN_IMAGE: &str = "https://placehold.co/200x200/FFFBF0/F97316?text=Meal";
const MIN_SEGMENT_PCT: f64 = 5.0;

const DIET_NOTES: &[&str] = &[
    "烹饪时请控制油盐用量，推荐使用橄榄油或山茶油。",
    "每天饮水至少 2000ml。",
    "蔬菜分量不限，饿了可以多吃绿叶菜。",
    "如有食物过敏，请自行替换同类食材。",
];

const STYLE: &str = r"
body{font-family:system-ui,'PingFang SC','Microsoft YaHei',sans-serif;background:#fffbf0;color:#0f172a;margin:0}
header.top{height:4rem;display:flex;align-items:center;justify-content:center;font-weight:900;color:#ea580c;letter-spacing:.2em;border-bottom:1px solid #ffedd5;background:#fff}
main{padding:2rem;max-width:80rem;margin:0 auto}
.card{background:#fff;border:2px solid #fed7aa;border-radius:1rem;padding:1rem}
.form{max-width:42rem;margin:0 auto}
.form label{display:block;font-weight:700;margin:.8rem 0 .3rem}
.form input,.form select{width:100%;padding:.7rem;border:1px solid #fed7aa;border-radius:.6rem;box-sizing:border-box}
.goals{display:flex;gap:.6rem}.goals label{flex:1;font-weight:700;border:2px solid #f1f5f9;border-radius:.6rem;padding:.6rem;text-align:center}
button{padding:.9rem 1.4rem;border:0;border-radius:.8rem;font-weight:700;cursor:pointer}
button.primary{background:#0f172a;color:#fff;width:100%;margin-top:1.2rem}
button.export{background:#f97316;color:#fff}
.alert{background:#fef2f2;color:#dc2626;border:1px solid #fee2e2;padding:1rem;border-radius:.6rem}
.badges{display:flex;flex-wrap:wrap;gap:.6rem;justify-content:center}
.badge{background:#f1f5f9;padding:.2rem .8rem;border-radius:999px;font-weight:700}
.badge.goal{background:#ffedd5;color:#9a3412}.badge.pref{background:#fef2f2;color:#dc2626}
.days{display:grid;grid-template-columns:repeat(auto-fill,minmax(18rem,1fr));gap:1.5rem;margin:2rem 0}
.day-head{display:flex;justify-content:space-between;align-items:baseline}
.day-index{font-weight:900;font-size:1.8rem;color:#f97316;opacity:.2}
.bar{display:flex;height:.5rem;border-radius:999px;overflow:hidden;background:#f1f5f9;margin-top:.5rem}
.seg-breakfast{background:#34d399}.seg-lunch{background:#fb923c}.seg-dinner{background:#f87171}.seg-snack{background:#93c5fd}
.meal{display:flex;gap:.7rem;padding:.8rem 0;border-bottom:1px dashed #fed7aa;break-inside:avoid}
.meal img{width:6rem;height:6rem;object-fit:cover;border-radius:.7rem;flex-shrink:0}
.meal .kcal{font-size:.7rem;color:#ea580c;font-weight:700}
.meal .ingredients,.meal ol{font-size:.75rem;color:#475569}
.footer-grid{display:grid;grid-template-columns:2fr 1fr;gap:2rem;border-top:4px solid #1e293b;padding-top:2rem}
@media print{.no-print{display:none}body{background:#fff}.days{grid-template-columns:1fr 1fr}}
";

/// A JS string literal that is safe inside an inline `<script>`.
#[must_use]
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_default()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Minimal HTML escaping for text and attribute values.
#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <header class=\"top no-print\">NUTRI·GEN</header>\n<main>\n{body}</main>\n</body>\n</html>\n",
        escape(title)
    )
}

fn options<T: Copy + PartialEq>(
    all: &[T],
    selected: T,
    value: fn(T) -> &'static str,
    label: fn(T) -> &'static str,
) -> String {
    all.iter()
        .map(|&v| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                value(v),
                if v == selected { " selected" } else { "" },
                label(v)
            )
        })
        .collect()
}

/// The profile form, optionally with a blocking alert after a failed attempt.
#[must_use]
pub fn render_form(profile: &UserProfile, alert: Option<&str>) -> String {
    let mut body = String::new();

    if let Some(msg) = alert {
        let _ = write!(
            body,
            "<div class=\"alert\" role=\"alert\">{}</div>\n<script>alert({});</script>\n",
            escape(msg),
            js_string(msg)
        );
    }

    let goals: String = Goal::ALL
        .iter()
        .map(|&g| {
            format!(
                "<label><input type=\"radio\" name=\"goal\" value=\"{}\"{}> {}</label>",
                g.as_str(),
                if g == profile.goal { " checked" } else { "" },
                g.label()
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card form">
<h1>AI 膳食指南</h1>
<p>基于中国居民膳食指南 · 个性化定制</p>
<form method="post" action="/">
<label for="gender">性别</label>
<select id="gender" name="gender">{gender}</select>
<label for="age">年龄</label>
<input id="age" type="number" name="age" min="1" max="120" value="{age}">
<label for="height">身高 (cm)</label>
<input id="height" type="number" step="any" name="height" value="{height}">
<label for="weight">体重 (kg)</label>
<input id="weight" type="number" step="any" name="weight" value="{weight}">
<label for="activity">日常活动强度</label>
<select id="activity" name="activity">{activity}</select>
<label>目标</label>
<div class="goals">{goals}</div>
<h3>饮食偏好设置 (选填)</h3>
<label for="excluded_ingredients">不喜欢的食材 / 忌口 (逗号分隔)</label>
<input id="excluded_ingredients" type="text" name="excluded_ingredients" placeholder="例如: 香菜, 苦瓜, 猪肉" value="{excluded}">
<label for="dietary_preference">饮食风格偏好</label>
<input id="dietary_preference" type="text" name="dietary_preference" placeholder="例如: 清淡, 喜辣, 低碳水, 面食为主" value="{preference}">
<button class="primary" type="submit">立即生成食谱</button>
</form>
</div>
"#,
        gender = options(Gender::ALL, profile.gender, Gender::as_str, Gender::label),
        age = profile.age,
        height = plain_number(profile.height),
        weight = plain_number(profile.weight),
        activity = options(
            ActivityLevel::ALL,
            profile.activity,
            ActivityLevel::as_str,
            ActivityLevel::label
        ),
        excluded = escape(&profile.excluded_ingredients),
        preference = escape(&profile.dietary_preference),
    );

    body.push_str(&analysis_widget());
    page("NutriGen AI 膳食指南", &body)
}

fn analysis_widget() -> String {
    format!(
        r#"<div class="card form" style="margin-top:2rem">
<h2>AI 食物热量扫描</h2>
<p>不确定这顿饭的热量？拍张照，AI帮您计算卡路里和营养成分。</p>
<input id="food-photo" type="file" accept="image/*" capture="environment">
<div id="food-result">识别结果将显示在这里</div>
</div>
<script>
document.getElementById('food-photo').addEventListener('change', async (e) => {{
  const file = e.target.files[0];
  if (!file) return;
  const out = document.getElementById('food-result');
  out.textContent = 'AI识别中...';
  const fd = new FormData();
  fd.append('image', file);
  try {{
    const res = await fetch('/analyze/upload', {{ method: 'POST', body: fd }});
    if (!res.ok) throw new Error(res.status);
    const r = await res.json();
    out.innerText = `${{r.food_name}}  健康分: ${{r.health_score}}/10\n热量 ${{r.calories}} kcal · 蛋白质 ${{r.protein}}g · 碳水 ${{r.carbs}}g · 脂肪 ${{r.fat}}g\nAI 建议: ${{r.advice}}`;
  }} catch (err) {{
    out.textContent = {failed};
  }}
}});
</script>
"#,
        failed = js_string(ANALYSIS_FAILED_MESSAGE)
    )
}

/// Width percentages of the calorie bar; every slot gets at least 5 % and
/// the snack segment only exists when it has calories.
#[must_use]
pub fn calorie_shares(day: &DayPlan) -> Vec<(MealSlot, f64)> {
    let total = if day.total_calories > 0.0 {
        day.total_calories
    } else {
        day.meal_calories_sum()
    };
    day.meals()
        .filter(|(slot, meal)| *slot != MealSlot::Snack || meal.calories > 0.0)
        .map(|(slot, meal)| {
            let pct = if total > 0.0 {
                meal.calories / total * 100.0
            } else {
                0.0
            };
            (slot, pct.max(MIN_SEGMENT_PCT))
        })
        .collect()
}

const fn segment_class(slot: MealSlot) -> &'static str {
    match slot {
        MealSlot::Breakfast => "seg-breakfast",
        MealSlot::Lunch => "seg-lunch",
        MealSlot::Dinner => "seg-dinner",
        MealSlot::Snack => "seg-snack",
    }
}

fn image_src(meal: &Meal, images: &HashMap<String, MealImage>) -> String {
    match images.get(&cache_key(&meal.name, meal.calories)) {
        Some(img) if !img.loading => img.src.clone(),
        _ if meal.visual_prompt_en.trim().is_empty() => PLACEHOLDER_IMAGE.to_string(),
        _ => lazy_image_path(meal),
    }
}

fn render_meal(out: &mut String, slot: MealSlot, meal: &Meal, images: &HashMap<String, MealImage>) {
    let ingredients = meal
        .ingredients
        .iter()
        .map(|i| format!("{}{}", i.name, i.amount))
        .collect::<Vec<_>>()
        .join("、");
    let steps: String = meal
        .recipe_steps
        .iter()
        .map(|s| format!("<li>{}</li>", escape(s)))
        .collect();

    let _ = write!(
        out,
        "<div class=\"meal\">\
         <img src=\"{src}\" alt=\"{name}\" loading=\"lazy\" onerror=\"this.onerror=null;this.src='{BROKEN_IMAGE}'\">\
         <div><div><strong>{slot}</strong> {name} <span class=\"kcal\">{kcal} kcal</span></div>\
         <div class=\"ingredients\">食材 {ingredients}</div>\
         <div>做法:</div><ol>{steps}</ol></div></div>\n",
        src = escape(&image_src(meal, images)),
        name = escape(&meal.name),
        slot = slot.short_label(),
        kcal = plain_number(meal.calories),
        ingredients = escape(&ingredients),
    );
}

fn render_day(out: &mut String, index: usize, day: &DayPlan, images: &HashMap<String, MealImage>) {
    let bar: String = calorie_shares(day)
        .into_iter()
        .map(|(slot, pct)| {
            format!(
                "<div class=\"{}\" style=\"width:{pct:.2}%\" title=\"{}\"></div>",
                segment_class(slot),
                slot.label()
            )
        })
        .collect();

    let _ = write!(
        out,
        "<section class=\"card day\">\n<div class=\"day-head\"><span class=\"day-index\">{:02}</span>\
         <strong>{}</strong><span>总摄入 <b>{}</b></span></div>\n<div class=\"bar\">{bar}</div>\n",
        index + 1,
        escape(&day.day),
        plain_number(day.total_calories),
    );
    for (slot, meal) in day.meals() {
        render_meal(out, slot, meal, images);
    }
    out.push_str("</section>\n");
}

/// The printable poster. `images` is keyed by [`cache_key`]; meals without a
/// ready entry point at the lazy raw-image route instead.
#[must_use]
pub fn render_poster(generated: &GeneratedPlan, images: &HashMap<String, MealImage>) -> String {
    let plan = &generated.plan;
    let profile = &generated.profile;
    let title = if plan.title.trim().is_empty() {
        FALLBACK_TITLE
    } else {
        plan.title.as_str()
    };

    let mut body = String::new();
    let _ = write!(
        body,
        r#"<div class="no-print" style="display:flex;justify-content:space-between;margin-bottom:1.5rem">
<a href="/">← 重新设定</a>
<button class="export" type="button" onclick="exportPoster()">导出完整食谱 PDF</button>
</div>
<script>
function exportPoster() {{
  const originalTitle = document.title;
  document.title = {title_js};
  window.print();
  setTimeout(() => {{ document.title = originalTitle; }}, 1000);
}}
</script>
<div class="poster">
<div style="text-align:center;border-bottom:4px solid #f97316;padding-bottom:1.5rem">
<h1>{title}</h1>
<div class="badges">
<span class="badge goal">{goal}</span>
<span class="badge">{gender} · {age}岁</span>
<span class="badge">BMI: {bmi}</span>
"#,
        title_js = js_string(title),
        title = escape(title),
        goal = profile.goal.label(),
        gender = profile.gender.label(),
        age = profile.age,
        bmi = escape(&generated.bmi),
    );
    if profile.has_preferences() {
        body.push_str("<span class=\"badge pref\">已应用偏好设置</span>\n");
    }
    let _ = write!(
        body,
        "</div>\n<p><em>\"{}\"</em></p>\n</div>\n<div class=\"days\">\n",
        escape(&plan.summary)
    );

    for (i, day) in plan.days.iter().enumerate() {
        render_day(&mut body, i, day, images);
    }
    body.push_str("</div>\n<div class=\"footer-grid\">\n<div class=\"card\"><h3>购物清单</h3><ul>");
    for item in &plan.shopping_list {
        let _ = write!(body, "<li>{}</li>", escape(item));
    }
    body.push_str("</ul></div>\n<div class=\"card\"><h3>饮食须知</h3><ul>");
    for note in DIET_NOTES {
        let _ = write!(body, "<li>{note}</li>");
    }
    body.push_str(
        "</ul>\n<div style=\"text-align:center;margin-top:2rem\"><strong>NutriGen AI</strong>\
         <div>智能膳食规划系统</div></div></div>\n</div>\n</div>\n",
    );

    page(title, &body)
}
