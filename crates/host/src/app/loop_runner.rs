use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use manor::{EntityRegistry, HostContext, LifecycleController, LifecycleReport, LifecycleState};
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::demo::{embedded_bundle, DemoHost};

const TICK_INTERVAL: Duration = Duration::from_millis(16);
const MAX_TICKS: u32 = 600;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let embedded = match embedded_bundle(&app.settings) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, "embedded_bundle_build_failed");
            return ExitCode::FAILURE;
        }
    };
    let source = app.settings.bundle_source(&embedded);
    let mut host = DemoHost::new(&app.settings, app.network_mode);
    let mut controller = LifecycleController::new(app.settings, source, app.paths.root);

    controller.initialize();
    let events = controller.events();
    events.world_loaded(&controller.settings().target_context);

    let report = drive(&mut controller, &mut host, MAX_TICKS, TICK_INTERVAL);
    log_report(&report);
    if let Some(property) = host.registry.lookup(&controller.settings().property_code) {
        info!(
            property_code = %property.code,
            price = property.price,
            employee_capacity = property.employee_capacity,
            idle_points = property.employee_idle_points.len(),
            loading_docks = property.loading_docks.len(),
            switches = property.switches.len(),
            toggleables = property.toggleables.len(),
            "property_state"
        );
    }

    events.world_unloaded();
    step(&mut controller, &mut host);
    events.application_quit();
    step(&mut controller, &mut host);
    info!(state = ?controller.state(), "shutdown");

    if report.state == LifecycleState::Ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Ticks at a fixed interval until the pipeline is ready, gives up after a failure, or runs
/// out of ticks.
pub(crate) fn drive(
    controller: &mut LifecycleController,
    host: &mut DemoHost,
    max_ticks: u32,
    interval: Duration,
) -> LifecycleReport {
    for tick in 1..=max_ticks {
        let state = step(controller, host);
        if state == LifecycleState::Ready {
            info!(ticks = tick, "pipeline_settled");
            break;
        }
        // The first tick only settles the world load; an Idle controller with an error after
        // that has aborted the run.
        if tick > 1 && state == LifecycleState::Idle && controller.report().last_error.is_some() {
            warn!(ticks = tick, "pipeline_aborted_stopping_driver");
            break;
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    controller.report()
}

fn step(controller: &mut LifecycleController, host: &mut DemoHost) -> LifecycleState {
    let mut context = HostContext::new(&mut host.world, host.network.as_mut(), &mut host.registry);
    controller.tick(&mut context)
}

fn log_report(report: &LifecycleReport) {
    match &report.instance {
        Some(instance) => info!(
            state = ?report.state,
            instance = %instance.name,
            mode = ?instance.mode,
            replication_id = instance.replication.map(|id| id.0),
            configuration_applied = report.configuration_applied,
            poster_relocated = report.relocated.is_some(),
            disabled_originals = report.disabled_originals,
            "lifecycle_report"
        ),
        None => warn!(
            state = ?report.state,
            last_error = report.last_error.map(|kind| kind.as_str()),
            bundle_loaded = report.bundle_loaded,
            "lifecycle_report_without_instance"
        ),
    }
}
