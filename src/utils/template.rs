//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const HTTP_PORT: &'static str = "http_port";
    pub const SERVER_NAME: &'static str = "server_name";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}
