//! Form-based UI declaration and rendering
//!
//! The interface is declared as data (controls, examples, texts) and
//! rendered to a single server-side HTML page. The page works without
//! JavaScript; a small script only fills the form from an example row.

use crate::models::{BloodPressure, Cholesterol, PatientInput, Sex};
use serde::Serialize;
use std::fmt::Write;

pub const TITLE: &str = "Drug Classification Predictor";

pub const DESCRIPTION: &str = "Enter patient details (Age, Sex, Blood Pressure, Cholesterol, \
Na/K Ratio) to predict the most suitable drug type using a pre-trained machine learning model.";

pub const ARTICLE: &[&str] = &[
    "This application demonstrates the use of a trained classification pipeline, exported to ONNX, to perform drug classification.",
    "It can be used as part of a CI/CD workflow for machine learning models, automating training, evaluation, and deployment.",
];

pub const OUTPUT_LABEL: &str = "Prediction Result";

/// One input widget
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputControl {
    Slider {
        name: &'static str,
        label: &'static str,
        info: &'static str,
        minimum: f64,
        maximum: f64,
        step: f64,
    },
    Radio {
        name: &'static str,
        label: &'static str,
        info: &'static str,
        choices: &'static [&'static str],
    },
}

impl InputControl {
    pub fn name(&self) -> &'static str {
        match self {
            InputControl::Slider { name, .. } | InputControl::Radio { name, .. } => name,
        }
    }
}

/// A clickable example row, in feature order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExampleRow {
    pub age: i64,
    pub sex: Sex,
    pub blood_pressure: BloodPressure,
    pub cholesterol: Cholesterol,
    pub na_to_k_ratio: f64,
}

impl ExampleRow {
    const fn new(
        age: i64,
        sex: Sex,
        blood_pressure: BloodPressure,
        cholesterol: Cholesterol,
        na_to_k_ratio: f64,
    ) -> Self {
        Self {
            age,
            sex,
            blood_pressure,
            cholesterol,
            na_to_k_ratio,
        }
    }

    pub fn to_input(&self) -> PatientInput {
        PatientInput::new(
            self.age as f64,
            self.sex.as_str(),
            self.blood_pressure.as_str(),
            self.cholesterol.as_str(),
            self.na_to_k_ratio,
        )
    }

    fn cells(&self) -> [String; 5] {
        [
            self.age.to_string(),
            self.sex.as_str().to_string(),
            self.blood_pressure.as_str().to_string(),
            self.cholesterol.as_str().to_string(),
            format!("{:.1}", self.na_to_k_ratio),
        ]
    }
}

/// Full interface declaration
#[derive(Debug, Clone, Serialize)]
pub struct Interface {
    pub title: &'static str,
    pub description: &'static str,
    pub article: &'static [&'static str],
    pub inputs: Vec<InputControl>,
    pub output_label: &'static str,
    pub examples: Vec<ExampleRow>,
    pub allow_flagging: bool,
}

/// The drug classification form
pub fn default_interface() -> Interface {
    use BloodPressure as Bp;
    use Cholesterol as Ch;

    Interface {
        title: TITLE,
        description: DESCRIPTION,
        article: ARTICLE,
        inputs: vec![
            InputControl::Slider {
                name: "age",
                label: "Age",
                info: "Enter patient's age (15-74)",
                minimum: 15.0,
                maximum: 74.0,
                step: 1.0,
            },
            InputControl::Radio {
                name: "sex",
                label: "Sex",
                info: "Select patient's sex",
                choices: Sex::CHOICES,
            },
            InputControl::Radio {
                name: "blood_pressure",
                label: "Blood Pressure",
                info: "Select blood pressure level",
                choices: BloodPressure::CHOICES,
            },
            InputControl::Radio {
                name: "cholesterol",
                label: "Cholesterol",
                info: "Select cholesterol level",
                choices: Cholesterol::CHOICES,
            },
            InputControl::Slider {
                name: "na_to_k_ratio",
                label: "Na_to_K Ratio",
                info: "Enter Sodium to Potassium ratio (6.2-38.2)",
                minimum: 6.2,
                maximum: 38.2,
                step: 0.1,
            },
        ],
        output_label: OUTPUT_LABEL,
        examples: vec![
            ExampleRow::new(47, Sex::Female, Bp::Low, Ch::High, 14.2),
            ExampleRow::new(30, Sex::Male, Bp::High, Ch::Normal, 15.4),
            ExampleRow::new(35, Sex::Female, Bp::Low, Ch::Normal, 8.0),
            ExampleRow::new(50, Sex::Male, Bp::High, Ch::High, 34.0),
            ExampleRow::new(68, Sex::Male, Bp::Low, Ch::High, 11.0),
            ExampleRow::new(22, Sex::Female, Bp::Normal, Ch::Normal, 28.1),
        ],
        allow_flagging: false,
    }
}

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the page, echoing the submitted values and the result if any
pub fn render_page(
    interface: &Interface,
    submitted: Option<&PatientInput>,
    result: Option<&str>,
) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let title = escape_html(interface.title);

    // Writing into a String cannot fail
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
<main>
    <h1>{title}</h1>
    <p class="description">{description}</p>
    <div class="panels">
    <form method="post" action="/predict" id="predict-form">
"#,
        description = escape_html(interface.description),
    );

    for control in &interface.inputs {
        let value = submitted.and_then(|input| input.field_text(control.name()));
        render_control(&mut html, control, value.as_deref());
    }

    let _ = write!(
        html,
        r#"        <div class="actions">
            <button type="reset">Clear</button>
            <button type="submit" class="primary">Submit</button>
        </div>
    </form>
    <section class="output">
        <h2>{label}</h2>
        <output form="predict-form" id="result">{result}</output>
    </section>
    </div>
"#,
        label = escape_html(interface.output_label),
        result = escape_html(result.unwrap_or("")),
    );

    render_examples(&mut html, interface);

    html.push_str("    <article>\n");
    for paragraph in interface.article {
        let _ = writeln!(html, "        <p>{}</p>", escape_html(paragraph));
    }
    html.push_str("    </article>\n</main>\n");
    html.push_str(SCRIPT);
    html.push_str("</body>\n</html>\n");
    html
}

fn render_control(html: &mut String, control: &InputControl, value: Option<&str>) {
    match control {
        InputControl::Slider {
            name,
            label,
            info,
            minimum,
            maximum,
            step,
        } => {
            let value = value.map(str::to_string).unwrap_or_else(|| minimum.to_string());
            let value = escape_html(&value);
            let _ = write!(
                html,
                r#"        <fieldset>
            <label for="{name}">{label}</label>
            <small>{info}</small>
            <div class="slider">
                <input type="range" id="{name}-range" min="{minimum}" max="{maximum}" step="{step}" value="{value}" oninput="this.form.elements['{name}'].value = this.value">
                <input type="number" id="{name}" name="{name}" min="{minimum}" max="{maximum}" step="{step}" value="{value}" oninput="this.form.elements['{name}-range'].value = this.value">
            </div>
        </fieldset>
"#,
                label = escape_html(label),
                info = escape_html(info),
            );
        }
        InputControl::Radio {
            name,
            label,
            info,
            choices,
        } => {
            let _ = write!(
                html,
                r#"        <fieldset>
            <legend>{label}</legend>
            <small>{info}</small>
            <div class="choices">
"#,
                label = escape_html(label),
                info = escape_html(info),
            );
            for choice in choices.iter() {
                let checked = if value == Some(*choice) { " checked" } else { "" };
                let _ = writeln!(
                    html,
                    r#"                <label><input type="radio" name="{name}" value="{choice}"{checked}> {choice}</label>"#,
                    choice = escape_html(choice),
                );
            }
            html.push_str("            </div>\n        </fieldset>\n");
        }
    }
}

fn render_examples(html: &mut String, interface: &Interface) {
    html.push_str("    <section class=\"examples\">\n        <h2>Examples</h2>\n        <table>\n            <thead><tr>");
    for control in &interface.inputs {
        let label = match control {
            InputControl::Slider { label, .. } | InputControl::Radio { label, .. } => label,
        };
        let _ = write!(html, "<th>{}</th>", escape_html(label));
    }
    html.push_str("</tr></thead>\n            <tbody>\n");

    for example in &interface.examples {
        let cells = example.cells();
        let data: Vec<String> = cells.iter().map(|c| escape_html(c)).collect();
        let _ = write!(
            html,
            r#"                <tr class="example" data-values="{}">"#,
            data.join("|")
        );
        for cell in &data {
            let _ = write!(html, "<td>{}</td>", cell);
        }
        html.push_str("</tr>\n");
    }
    html.push_str("            </tbody>\n        </table>\n    </section>\n");
}

const STYLE: &str = "
body { font-family: system-ui, sans-serif; background: #f7f7fb; color: #1f2937; margin: 0; }
main { max-width: 960px; margin: 0 auto; padding: 2rem 1rem; }
h1 { text-align: center; }
.description { text-align: center; color: #4b5563; }
.panels { display: grid; grid-template-columns: 3fr 2fr; gap: 1.5rem; }
form, .output, .examples { background: #fff; border-radius: 12px; padding: 1rem 1.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
fieldset { border: none; margin: 0 0 1rem; padding: 0; }
fieldset small { display: block; color: #6b7280; margin-bottom: .4rem; }
.slider { display: flex; gap: .75rem; align-items: center; }
.slider input[type=range] { flex: 1; }
.slider input[type=number] { width: 5rem; }
.choices label { margin-right: 1rem; }
.actions { display: flex; gap: .75rem; justify-content: flex-end; }
button { border: 1px solid #d1d5db; background: #f3f4f6; border-radius: 8px; padding: .5rem 1.25rem; cursor: pointer; }
button.primary { background: #6366f1; border-color: #6366f1; color: #fff; }
output { display: block; font-size: 1.5rem; font-weight: 600; min-height: 2rem; }
.examples { margin-top: 1.5rem; }
.examples table { width: 100%; border-collapse: collapse; }
.examples td, .examples th { text-align: left; padding: .35rem .5rem; border-bottom: 1px solid #e5e7eb; }
.examples tr.example { cursor: pointer; }
.examples tr.example:hover { background: #eef2ff; }
article { text-align: center; margin-top: 20px; color: #4b5563; }
";

const SCRIPT: &str = r#"<script>
document.querySelectorAll('tr.example').forEach(function (row) {
    row.addEventListener('click', function () {
        var form = document.getElementById('predict-form');
        var names = ['age', 'sex', 'blood_pressure', 'cholesterol', 'na_to_k_ratio'];
        row.dataset.values.split('|').forEach(function (value, i) {
            var field = form.elements[names[i]];
            if (field instanceof RadioNodeList) {
                field.forEach(function (radio) { radio.checked = radio.value === value; });
            } else {
                field.value = value;
                var range = form.elements[names[i] + '-range'];
                if (range) { range.value = value; }
            }
        });
    });
});
</script>
"#;
