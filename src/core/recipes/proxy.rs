use std::rc::Rc;

use super::{option_step, RecipeAction};
use crate::command_builder;
use crate::files::{self, EditOutcome};
use crate::error::Result;
use crate::options::InstallOptions;
use crate::plan::{Plan, PlanContext, StepOutcome};
use crate::service::ServiceControl;
use crate::session::Session;
use crate::utils::template::{self, TemplateVars};

const NGINX_SERVICE: &str = "nginx";
const SITE_AVAILABLE: &str = "/etc/nginx/sites-available/nexus";
const SITE_ENABLED: &str = "/etc/nginx/sites-enabled/nexus";
const DEFAULT_SITE_ENABLED: &str = "/etc/nginx/sites-enabled/default";
/// Link target, relative so the link survives a moved `/etc/nginx`.
const SITE_LINK_TARGET: &str = "../sites-available/nexus";

const BUNDLED_SITE: &str = include_str!("../../../assets/nginx-nexus.conf");

/// nginx in front of Nexus on port 80.
pub fn install_proxy(options: &InstallOptions) -> Plan {
    let shared = Rc::new(options.clone());
    let step = |name: &str, action: RecipeAction| option_step(name, &shared, action);

    Plan::new("proxy")
        .step(step("stop-nginx", stop_nginx).lenient())
        .step(step("install-nginx", install_nginx))
        .step(step("upload-site", upload_site))
        .step(step("disable-default-site", disable_default_site))
        .step(step("enable-site", enable_site))
        .step(step("start-nginx", start_nginx))
}

/// Site file rendered for the given Nexus port.
pub fn bundled_site(http_port: u16) -> String {
    template::render(
        BUNDLED_SITE,
        &[
            (TemplateVars::HTTP_PORT, &http_port.to_string()),
            (TemplateVars::SERVER_NAME, "_"),
        ],
    )
}

fn stop_nginx(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    ServiceControl::new(session).stop(NGINX_SERVICE)?;
    Ok(StepOutcome::done())
}

fn install_nginx(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    session.run(&command_builder::apt_install(NGINX_SERVICE))?;
    Ok(StepOutcome::done())
}

fn upload_site(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    match &o.proxy_site_file {
        Some(local) => {
            session.upload_file(local, SITE_AVAILABLE, true)?;
            Ok(StepOutcome::with_output(local.display().to_string()))
        }
        None => {
            session.write_text(SITE_AVAILABLE, &bundled_site(o.http_port))?;
            Ok(StepOutcome::with_output("bundled site"))
        }
    }
}

fn disable_default_site(
    session: &Session,
    _: &mut PlanContext,
    _: &InstallOptions,
) -> Result<StepOutcome> {
    match files::ensure_absent(session, DEFAULT_SITE_ENABLED)? {
        EditOutcome::Changed => Ok(StepOutcome::done()),
        EditOutcome::Unchanged => Ok(StepOutcome::skip("default site already disabled")),
    }
}

fn enable_site(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    files::ensure_symlink(session, SITE_ENABLED, SITE_LINK_TARGET)?;
    Ok(StepOutcome::done())
}

fn start_nginx(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    ServiceControl::new(session).start(NGINX_SERVICE)?;
    Ok(StepOutcome::done())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_site_proxies_to_nexus_port() {
        let site = bundled_site(8081);
        assert!(site.contains("proxy_pass http://127.0.0.1:8081/;"));
        assert!(site.contains("server_name _;"));
        assert!(!site.contains("{{"));
    }

    #[test]
    fn proxy_steps_in_order() {
        let options = crate::options::InstallOptions::resolve(
            crate::options::InstallRequest::from_defaults(&Default::default()),
            chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap();
        let names: Vec<String> = install_proxy(&options)
            .outline()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            [
                "stop-nginx",
                "install-nginx",
                "upload-site",
                "disable-default-site",
                "enable-site",
                "start-nginx"
            ]
        );
    }
}
