mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use common::{session, ScriptedTransport};
use nexus_provision::defaults::InstallDefaults;
use nexus_provision::options::InstallRequest;
use nexus_provision::recipes::{install_nexus, install_proxy, Recipe};
use nexus_provision::sequencer;
use nexus_provision::ssh::CommandResult;
use nexus_provision::{dry_run, ErrorCode, InstallOptions, PlanState, StepState};

const BUNDLED_INIT_SCRIPT: &str = "#!/bin/sh\n\
NEXUS_HOME=\"..\"\n\
#RUN_AS_USER=\n\
PIDDIR=\".\"\n";

fn options(configure: impl FnOnce(&mut InstallRequest)) -> InstallOptions {
    let mut request = InstallRequest::from_defaults(&InstallDefaults::default());
    configure(&mut request);
    InstallOptions::for_today(request).unwrap()
}

fn step_state(report: &nexus_provision::PlanReport, name: &str) -> Option<StepState> {
    report.steps.iter().find(|s| s.name == name).map(|s| s.state)
}

#[test]
fn backup_step_moves_current_install_aside_once() {
    let options = options(|r| r.install_dir = "/data/nexus".to_string());
    assert_eq!(
        options.date_stamp,
        chrono::Local::now().format("%m-%d-%y").to_string()
    );

    let transport = Arc::new(ScriptedTransport::new().fail(
        &format!("test -e '{}'", options.nexus_old_dir_name),
        "",
    ));
    let plan = install_nexus(&options)
        .only(&["backup-current".to_string()])
        .unwrap();

    let report = sequencer::execute(&plan, &session(&transport));

    assert_eq!(report.state, PlanState::Completed);
    assert_eq!(step_state(&report, "backup-current"), Some(StepState::Succeeded));
    assert_eq!(
        transport.sent_matching("mv "),
        [format!(
            "cd '/data/nexus' && mv 'nexus-current' '{}'",
            options.nexus_old_dir_name
        )]
    );
}

#[test]
fn same_day_rerun_keeps_both_backups() {
    let options = options(|r| r.install_dir = "/data/nexus".to_string());
    let transport = Arc::new(ScriptedTransport::new());
    let plan = install_nexus(&options)
        .only(&["backup-current".to_string()])
        .unwrap();

    let report = sequencer::execute(&plan, &session(&transport));

    assert_eq!(report.state, PlanState::Completed);
    assert!(transport.sent_matching("rm -rf").is_empty());
    assert_eq!(
        transport.sent_matching("mv "),
        [format!(
            "cd '/data/nexus' && n=1 && while [ -e '{old}'-\"$n\" ] || [ -L '{old}'-\"$n\" ]; \
             do n=$((n+1)); done && mv 'nexus-current' '{old}'-\"$n\"",
            old = options.nexus_old_dir_name
        )]
    );
}

#[test]
fn backup_step_skips_when_nothing_is_installed() {
    let options = options(|_| {});
    let transport = Arc::new(ScriptedTransport::new().fail("test -e", ""));
    let plan = install_nexus(&options)
        .only(&["backup-current".to_string()])
        .unwrap();

    let report = sequencer::execute(&plan, &session(&transport));

    assert_eq!(report.state, PlanState::Completed);
    assert_eq!(step_state(&report, "backup-current"), Some(StepState::Skipped));
    assert!(transport.sent_matching("mv ").is_empty());
}

#[test]
fn fresh_install_runs_every_step() {
    let options = options(|_| {});
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail("test -e", "")
            .fail("readlink", "")
            .respond("ls | grep -F nexus", CommandResult::ok("nexus-2.14.5-02\n"))
            .respond(
                "base64 < '/data/nexus/nexus-current/bin/nexus'",
                CommandResult::ok(STANDARD.encode(BUNDLED_INIT_SCRIPT)),
            ),
    );

    let report = sequencer::execute(&install_nexus(&options), &session(&transport));

    assert_eq!(report.state, PlanState::Completed, "{:#?}", report.steps);
    assert_eq!(step_state(&report, "backup-conf"), Some(StepState::Skipped));
    assert_eq!(step_state(&report, "backup-current"), Some(StepState::Skipped));
    assert_eq!(step_state(&report, "migrate-config"), Some(StepState::Skipped));
    assert_eq!(step_state(&report, "startup-script"), Some(StepState::Succeeded));
    assert_eq!(
        step_state(&report, "configure-init-script"),
        Some(StepState::Succeeded)
    );

    assert_eq!(
        transport.sent_matching("mv 'working/"),
        ["cd '/data/nexus' && mv 'working/nexus-2.14.5-02' 'nexus-current'"]
    );
    assert_eq!(
        transport.sent_matching("ln -s '/data/nexus/nexus-current' "),
        ["rm -rf '/usr/local/nexus' && ln -s '/data/nexus/nexus-current' '/usr/local/nexus'"]
    );
    assert_eq!(
        transport.sent_matching("useradd"),
        ["id -u nexus >/dev/null 2>&1 || useradd --home-dir '/data/nexus' nexus"]
    );
    assert!(transport
        .sent()
        .iter()
        .any(|c| c == "chown -R nexus:nexus '/data/nexus'"));
}

#[test]
fn failed_download_aborts_before_extracting() {
    let options = options(|_| {});
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail("test -e", "")
            .fail("curl", "curl: (22) The requested URL returned error: 404"),
    );

    let report = sequencer::execute(&install_nexus(&options), &session(&transport));

    assert_eq!(report.state, PlanState::Aborted);
    assert_eq!(report.steps.last().map(|s| s.name.as_str()), Some("download"));
    assert!(transport.sent_matching("tar xzf").is_empty());

    let err = report.to_error().unwrap();
    assert_eq!(err.code, ErrorCode::PlanAborted);
    assert_eq!(
        err.details["stderr"],
        "curl: (22) The requested URL returned error: 404"
    );
    assert!(err.details["command"]
        .as_str()
        .unwrap()
        .contains(&format!("-o '{}'", options.archive_name)));
    assert_eq!(
        err.details["completedSteps"],
        serde_json::json!(["stop-nexus", "create-user", "create-install-dir", "backup-conf"])
    );
}

#[test]
fn migrate_from_copies_both_conf_dirs() {
    let options = options(|r| r.migrate_from = Some("/opt/nexus-2.0/".to_string()));
    let transport = Arc::new(ScriptedTransport::new());
    let plan = install_nexus(&options)
        .only(&["migrate-config".to_string()])
        .unwrap();

    let report = sequencer::execute(&plan, &session(&transport));

    assert_eq!(report.state, PlanState::Completed);
    assert_eq!(
        transport.sent_matching("rsync"),
        [
            "rsync -pr '/opt/nexus-2.0/conf/' '/data/nexus/nexus-current/conf/'",
            "rsync -pr '/opt/nexus-2.0/../sonatype-work/nexus/conf/' '/data/nexus/sonatype-work/nexus/conf/'",
        ]
    );
}

#[test]
fn proxy_writes_bundled_site_and_skips_removed_default() {
    let options = options(|_| {});
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail("test -e '/etc/nginx/sites-enabled/default'", "")
            .fail("readlink", ""),
    );

    let report = sequencer::execute(&install_proxy(&options), &session(&transport));

    assert_eq!(report.state, PlanState::Completed);
    assert_eq!(
        step_state(&report, "disable-default-site"),
        Some(StepState::Skipped)
    );
    assert_eq!(transport.sent_matching("base64 -d").len(), 1);
    assert_eq!(
        transport.sent_matching("ln -s"),
        ["rm -rf '/etc/nginx/sites-enabled/nexus' && ln -s '../sites-available/nexus' '/etc/nginx/sites-enabled/nexus'"]
    );
}

#[test]
fn dry_run_covers_every_recipe() {
    let options = options(|r| {
        r.install_jdk = true;
        r.install_nginx = true;
    });

    for recipe in Recipe::ALL {
        let plan = recipe.build(&options);
        let report = dry_run(&plan, "ubuntu@nexus.test");

        assert!(report.dry_run);
        assert_eq!(report.state, PlanState::Completed, "{}", recipe);
        assert_eq!(report.steps.len(), plan.len());
        assert!(report.steps.iter().all(|s| !s.commands.is_empty()));
    }
}
