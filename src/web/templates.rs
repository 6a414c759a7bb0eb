use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;
use tracing::error;

/// Builds the template environment with every page template compiled in.
pub fn init_templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();

    env.add_template("base.html", include_str!("../../templates/base.html"))?;
    env.add_template("index.html", include_str!("../../templates/index.html"))?;
    env.add_template("table.html", include_str!("../../templates/table.html"))?;
    env.add_template("stocks.html", include_str!("../../templates/stocks.html"))?;

    Ok(env)
}

pub fn render_template<S: Serialize>(env: &Environment, template_name: &str, context: S) -> Html<String> {
    match env.get_template(template_name) {
        Ok(tmpl) => match tmpl.render(context) {
            Ok(result) => Html(result),
            Err(e) => {
                error!("Template render error: {}", e);
                Html(format!("<h1>Template Error</h1><p>{}</p>", e))
            }
        },
        Err(e) => {
            error!("Template not found: {} ({})", template_name, e);
            Html(format!("<h1>Template Not Found</h1><p>{}: {}</p>", template_name, e))
        }
    }
}
