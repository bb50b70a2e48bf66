use crate::command_builder;
use crate::options::InstallOptions;
use crate::plan::{Plan, Step};

/// Headless Java runtime from the distribution's package manager.
pub fn install_runtime(options: &InstallOptions) -> Plan {
    Plan::new("runtime").step(Step::command(
        "install-jdk",
        command_builder::apt_install(&options.jdk_package),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dry_run::dry_run;
    use crate::options::InstallRequest;

    #[test]
    fn installs_configured_package() {
        let mut request = InstallRequest::from_defaults(&Default::default());
        request.jdk_package = "openjdk-17-jre-headless".to_string();
        let options = InstallOptions::for_today(request).unwrap();

        let report = dry_run(&install_runtime(&options), "ubuntu@nexus");
        assert_eq!(
            report.steps[0].commands,
            ["DEBIAN_FRONTEND=noninteractive apt-get install -y openjdk-17-jre-headless"]
        );
    }
}
