use std::rc::Rc;

use super::{literal, option_step, proxy, runtime, RecipeAction};
use crate::command_builder;
use crate::error::{Error, Result};
use crate::files::{self, EditOutcome};
use crate::options::{InstallOptions, INIT_SCRIPT_LINK, NEXUS_LINK, NEXUS_SERVICE};
use crate::plan::{Plan, PlanContext, StepOutcome};
use crate::service::ServiceControl;
use crate::session::Session;

const EXTRACTED_DIR: &str = "extracted_dir";
/// Entries of the release archive contain this in their top-level name.
const RELEASE_MARKER: &str = "nexus";

/// Install or upgrade Nexus under `options.install_dir`.
pub fn install_nexus(options: &InstallOptions) -> Plan {
    let shared = Rc::new(options.clone());
    let step = |name: &str, action: RecipeAction| option_step(name, &shared, action);

    let plan = Plan::new("nexus")
        .step(step("stop-nexus", stop_nexus).lenient())
        .step(step("create-user", create_user).lenient())
        .step(step("create-install-dir", create_install_dir));

    let plan = if options.install_jdk {
        plan.extend(runtime::install_runtime(options))
    } else {
        plan
    };

    let plan = plan
        .step(step("backup-conf", backup_conf).lenient())
        .step(step("download", download))
        .step(step("prepare-working-dir", prepare_working_dir))
        .step(step("extract", extract))
        .step(step("locate-extracted-dir", locate_extracted_dir))
        .step(step("backup-current", backup_current))
        .step(step("install-extracted", install_extracted))
        .step(step("migrate-config", migrate_config))
        .step(step("link-install", link_install))
        .step(step("startup-script", startup_script))
        .step(step("configure-init-script", configure_init_script))
        .step(step("update-ownership", update_ownership))
        .step(step("start-nexus", start_nexus))
        .step(step("cleanup-working-dir", cleanup_working_dir).lenient());

    if options.install_nginx {
        plan.extend(proxy::install_proxy(options))
    } else {
        plan
    }
}

fn stop_nexus(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    ServiceControl::new(session).stop(NEXUS_SERVICE)?;
    Ok(StepOutcome::done())
}

fn create_user(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    session.run(&command_builder::ensure_user(&o.nexus_username, &o.install_dir))?;
    Ok(StepOutcome::done())
}

fn create_install_dir(
    session: &Session,
    _: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    session.run(&command_builder::make_dir(&o.install_dir))?;
    files::set_ownership(session, &o.install_dir, &o.nexus_username, false)?;
    Ok(StepOutcome::done())
}

/// Snapshot the live conf dir before anything is replaced.
fn backup_conf(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    let conf_dir = o.conf_dir();
    if !files::exists(session, &conf_dir) {
        return Ok(StepOutcome::skip(format!("{} does not exist yet", conf_dir)));
    }

    // The backup lives inside the conf dir, so earlier backups are excluded.
    session.run(&command_builder::sync_dir_excluding(
        &conf_dir,
        &o.conf_backup_dir(),
        "conf-backup-*",
    ))?;
    Ok(StepOutcome::done())
}

fn download(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    session.with_directory(&o.install_dir, |s| {
        s.run(&command_builder::download(&o.download_url, &o.archive_name))?;
        Ok(StepOutcome::with_output(o.archive_name.clone()))
    })
}

/// Start every run from an empty working dir so only one release is in it.
fn prepare_working_dir(
    session: &Session,
    _: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    let working = o.working_path();
    files::ensure_absent(session, &working)?;
    session.run(&command_builder::make_dir(&working))?;
    Ok(StepOutcome::done())
}

fn extract(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    session.with_directory(&o.install_dir, |s| {
        s.run(&command_builder::extract_tarball(&o.archive_name, &o.working_dir))?;
        Ok(StepOutcome::done())
    })
}

fn locate_extracted_dir(
    session: &Session,
    context: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    let entry = session.with_directory(&o.working_path(), |s| {
        s.capture(&command_builder::find_entry(RELEASE_MARKER))
    })?;

    if entry.is_empty() {
        return Err(Error::internal_unexpected(format!(
            "No '{}' directory found after extracting {}",
            RELEASE_MARKER, o.archive_name
        )));
    }

    context.insert(EXTRACTED_DIR, format!("{}/{}", o.working_dir, entry));
    Ok(StepOutcome::with_output(entry))
}

/// Move the running release aside as `nexus-old-{date}`.
///
/// A same-day re-run finds that name taken and uses `nexus-old-{date}-N`, so
/// no earlier backup and no live release is ever deleted.
fn backup_current(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    session.with_directory(&o.install_dir, |s| {
        if !files::exists(s, &o.nexus_current_dir_name) {
            return Ok(StepOutcome::skip("no current install to back up"));
        }

        if files::exists(s, &o.nexus_old_dir_name) {
            log_status!(
                "install",
                "{} already exists; backing up {} under a numbered name",
                o.nexus_old_dir_name,
                o.nexus_current_dir_name
            );
            s.run(&command_builder::move_to_numbered(
                &o.nexus_current_dir_name,
                &o.nexus_old_dir_name,
            ))?;
            return Ok(StepOutcome::done());
        }

        s.run(&command_builder::move_path(
            &o.nexus_current_dir_name,
            &o.nexus_old_dir_name,
        ))?;
        Ok(StepOutcome::done())
    })
}

fn install_extracted(
    session: &Session,
    context: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    let extracted = context.require(EXTRACTED_DIR)?.to_string();
    session.with_directory(&o.install_dir, |s| {
        s.run(&command_builder::move_path(&extracted, &o.nexus_current_dir_name))?;
        Ok(StepOutcome::done())
    })
}

/// Carry conf over from `migrate_from`, or else from today's backup.
fn migrate_config(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    let current_conf = format!("{}/conf", o.current_dir());

    if let Some(source) = o.migrate_from.as_deref() {
        let source = source.trim_end_matches('/');
        session.run(&command_builder::sync_dir(
            &format!("{}/conf", source),
            &current_conf,
        ))?;
        session.run(&command_builder::sync_dir(
            &format!("{}/../sonatype-work/nexus/conf", source),
            &o.conf_dir(),
        ))?;
        return Ok(StepOutcome::done());
    }

    let old_dir = o.old_dir();
    if !files::exists(session, &old_dir) {
        return Ok(StepOutcome::skip(
            "no migrate_from given and no previous install to migrate",
        ));
    }

    session.run(&command_builder::sync_dir(
        &format!("{}/conf", old_dir),
        &current_conf,
    ))?;
    Ok(StepOutcome::done())
}

fn link_install(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    files::ensure_symlink(session, NEXUS_LINK, &o.current_dir())?;
    Ok(StepOutcome::done())
}

fn startup_script(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    if files::exists(session, INIT_SCRIPT_LINK) {
        return Ok(StepOutcome::skip(format!("{} already installed", INIT_SCRIPT_LINK)));
    }

    files::ensure_symlink(session, INIT_SCRIPT_LINK, &o.startup_script_path())?;
    files::set_mode(session, INIT_SCRIPT_LINK, "755")?;
    ServiceControl::new(session).register_defaults(NEXUS_SERVICE)?;
    Ok(StepOutcome::done())
}

/// Point the bundled init script at the stable link, the service user and a
/// pid dir that user can write.
fn configure_init_script(
    session: &Session,
    _: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    let script = o.startup_script_path();

    let edits = [
        (
            r"^NEXUS_HOME=.*$",
            format!("NEXUS_HOME=\"{}\"", NEXUS_LINK),
        ),
        (
            r"^RUN_AS_USER=.*$",
            format!("RUN_AS_USER={}", o.nexus_username),
        ),
        (r"^#?\s*PIDDIR=.*$", format!("PIDDIR=\"{}\"", o.install_dir)),
    ];

    let mut changed = 0;
    if files::uncomment(session, &script, "RUN_AS_USER", '#')? == EditOutcome::Changed {
        changed += 1;
    }
    for (pattern, replacement) in &edits {
        if files::replace_text(session, &script, pattern, &literal(replacement))?
            == EditOutcome::Changed
        {
            changed += 1;
        }
    }

    if changed == 0 {
        Ok(StepOutcome::skip("init script already configured"))
    } else {
        Ok(StepOutcome::with_output(format!("{} edits to {}", changed, script)))
    }
}

fn update_ownership(session: &Session, _: &mut PlanContext, o: &InstallOptions) -> Result<StepOutcome> {
    files::set_ownership(session, &o.install_dir, &o.nexus_username, true)?;
    Ok(StepOutcome::done())
}

fn start_nexus(session: &Session, _: &mut PlanContext, _: &InstallOptions) -> Result<StepOutcome> {
    ServiceControl::new(session).start(NEXUS_SERVICE)?;
    Ok(StepOutcome::done())
}

fn cleanup_working_dir(
    session: &Session,
    _: &mut PlanContext,
    o: &InstallOptions,
) -> Result<StepOutcome> {
    files::ensure_absent(session, &o.working_path())?;
    Ok(StepOutcome::done())
}
