use color_eyre::{eyre::eyre, Result};
use std::str::FromStr;
use std::time::Duration;
use tickwork::controller::{
    load_profiles, Button, Command, DeviceDefaults, Dpad, LogicalDevice,
};
use tickwork::events::{EventHandler, Listener};
use tickwork::mapping::{GilrsInput, Mapping};
use tickwork::model::ModelChange;
use tickwork::{Controller, InputSource, Model, Runtime, ScriptedInput, Settings};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const KEY_LEFT: u32 = 37;
const KEY_UP: u32 = 38;
const KEY_RIGHT: u32 = 39;
const KEY_DOWN: u32 = 40;
const KEY_SPACE: u32 = 32;

const DOUBLE_TAP_UP: &str = "double_tap_up";
const REPLAY_FRAMES: u64 = 12;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = setup()?;
    let replay = std::env::args().any(|arg| arg == "--replay");

    let source: Box<dyn InputSource> = if replay {
        info!("Replaying scripted input");
        Box::new(replay_script())
    } else {
        match GilrsInput::new() {
            Ok(input) => Box::new(input),
            Err(e) => {
                warn!("{}, falling back to an idle script", e);
                Box::new(ScriptedInput::new(Vec::new()))
            }
        }
    };

    let mut runtime = build_runtime(source, &settings)?;
    let frame_time = settings.frame_time();
    let mut frames = tokio::time::interval(Duration::from_secs_f32(frame_time));
    let mut stats = tokio::time::interval(Duration::from_secs(settings.stats_interval_secs.max(1)));
    let replay_len = if replay { Some(REPLAY_FRAMES) } else { None };

    info!("Running at {} ticks per second", settings.frame_rate);
    loop {
        tokio::select! {
            _ = frames.tick() => {
                for fired in runtime.tick(frame_time) {
                    info!("{} fired '{}'", fired.controller, fired.command);
                }
                if replay_len.is_some_and(|len| runtime.ticks() >= len) {
                    log_stats(&runtime);
                    break;
                }
            }
            _ = stats.tick() => log_stats(&runtime),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                log_stats(&runtime);
                break;
            }
        }
    }

    Ok(())
}

fn setup() -> Result<Settings> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    let settings = Settings::load()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &settings.log_level)
    }
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| Level::from_str(&level).ok())
        .unwrap_or(Level::INFO);
    setup_logging_env(level);
    info!("Settings: {:?}", settings);
    Ok(settings)
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn build_runtime(source: Box<dyn InputSource>, settings: &Settings) -> Result<Runtime> {
    let defaults = settings.device_defaults();
    let joysticks = source.joysticks();

    let (mut controllers, failed) = load_profiles(&settings.profiles, &joysticks, &defaults);
    if !failed.is_empty() {
        warn!("{} profile(s) could not be loaded", failed.len());
    }
    if controllers.is_empty() {
        info!("No profile loaded, using the keyboard layout");
        controllers.push(keyboard_controller(&defaults));
    }

    let mut runtime = Runtime::new(source);
    let model = Model::attach(runtime.bus_mut());

    let shield = ModelChange::ToggleValue {
        name: "shield".into(),
    }
    .action(model)
    .map_err(|e| eyre!("Failed to build shield action: {}", e))?;
    let game = runtime.bus_mut().register(
        EventHandler::new("game")
            .on(DOUBLE_TAP_UP, |ctx, event| {
                let taps = ctx
                    .model()
                    .get("taps")
                    .and_then(|v| v.as_int())
                    .unwrap_or(0);
                ctx.model().set_value("taps", taps + 1);
                debug!("{} at tick {}", event, ctx.tick());
            })
            .on("jump", |ctx, _| {
                let jumps = ctx.model().get("jumps").and_then(|v| v.as_int()).unwrap_or(0);
                ctx.model().set_value("jumps", jumps + 1);
            }),
    );
    runtime
        .bus_mut()
        .listen(game, Listener::respond(DOUBLE_TAP_UP, shield))
        .map_err(|e| eyre!("Failed to listen on game handler: {}", e))?;
    runtime
        .bus_mut()
        .model_mut()
        .subscribe("shield", |value| info!("Shield {}", value));
    runtime.subscribe(game);

    for mut controller in controllers {
        controller.set_capacity(settings.frame_slice_size);
        if controller.device("dpad").is_some() {
            let command = Command::motion(DOUBLE_TAP_UP, "dpad", &[(0, -1), (0, 0), (0, -1)], Some(12))
                .map_err(|e| eyre!("Failed to build command: {}", e))?;
            controller
                .add_command(command)
                .map_err(|e| eyre!("Failed to attach command: {}", e))?;
        }
        runtime.add_controller(controller);
    }
    Ok(runtime)
}

fn keyboard_controller(defaults: &DeviceDefaults) -> Controller {
    let key = |id: u32, name: &str| Button::new(name, Mapping::key(id, name), defaults);
    let dpad = Dpad::new(
        "dpad",
        key(KEY_UP, "up"),
        key(KEY_DOWN, "down"),
        key(KEY_LEFT, "left"),
        key(KEY_RIGHT, "right"),
    );
    let mut controller = Controller::new(
        "keyboard",
        vec![
            LogicalDevice::Dpad(dpad),
            LogicalDevice::Button(key(KEY_SPACE, "jump")),
        ],
    );
    let jump = tickwork::Step::new("jump pressed", 1)
        .map(|step| step.with_condition(tickwork::controller::conditions::button_pressed(0)));
    match jump.and_then(|step| Command::new("jump", vec!["jump".into()], vec![step], None)) {
        Ok(command) => {
            if let Err(e) = controller.add_command(command) {
                warn!("Jump command not attached: {}", e);
            }
        }
        Err(e) => warn!("Jump command not built: {}", e),
    }
    controller
}

fn replay_script() -> ScriptedInput {
    let mut input = ScriptedInput::new(Vec::new());
    input.push_keys(vec![
        vec![],
        vec![KEY_UP],
        vec![],
        vec![KEY_UP],
        vec![],
        vec![KEY_SPACE],
        vec![],
    ]);
    input
}

fn log_stats(runtime: &Runtime) {
    let model = runtime.bus().model();
    info!(
        "[{}] tick {} | commands fired {} | taps {} | jumps {} | shield {}",
        chrono::Local::now().format("%H:%M:%S"),
        runtime.ticks(),
        runtime.fired_total(),
        model.get("taps").map_or("0".to_string(), ToString::to_string),
        model.get("jumps").map_or("0".to_string(), ToString::to_string),
        model.get("shield").map_or("false".to_string(), ToString::to_string),
    );
}
