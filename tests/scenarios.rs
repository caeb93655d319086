use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use tickwork::controller::{conditions, Button, DeviceDefaults, Dpad, LogicalDevice};
use tickwork::events::{EventHandler, Listener};
use tickwork::mapping::JoystickDescriptor;
use tickwork::model::ModelChange;
use tickwork::{
    ActionTemplate, Clock, Command, Controller, ControllerProfile, DeviceValue, Event, EventBus,
    Mapping, Model, Runtime, ScriptedInput, Step, Timer, Value,
};

const DT: f32 = 1.0 / 60.0;
const KEY_SPACE: u32 = 32;
const KEY_LEFT: u32 = 37;
const KEY_RIGHT: u32 = 39;

fn pad() -> JoystickDescriptor {
    JoystickDescriptor {
        name: "Pad".into(),
        buttons: 4,
        axes: 2,
        hats: 1,
    }
}

fn hat_profile() -> ControllerProfile {
    let hat = |x: i8, y: i8| {
        json!({"map_type": "hat", "map_id": 0, "joy_id": 0, "joy_name": "Pad",
               "position": [x, y], "axis": -1})
    };
    let profile = json!({
        "name": "pad",
        "devices": [
            {"type": "Dpad", "name": "dpad",
             "up": hat(0, -1), "down": hat(0, 1), "left": hat(-1, 0), "right": hat(1, 0)}
        ]
    });
    ControllerProfile::from_json(&profile.to_string()).unwrap()
}

/// 1-based ticks on which `command` fired
fn fired_on(runtime: &mut Runtime, ticks: usize, command: &str) -> Vec<usize> {
    (1..=ticks)
        .filter(|_| runtime.tick(DT).iter().any(|f| f.command == command))
        .collect()
}

#[test]
fn single_button_edge() {
    let mut input = ScriptedInput::new(Vec::new());
    input.push_keys([vec![], vec![KEY_SPACE], vec![KEY_SPACE], vec![]]);
    let defaults = DeviceDefaults {
        init_delay: 12,
        repeat_delay: 1,
        ..DeviceDefaults::default()
    };
    let button = Button::new("a", Mapping::key(KEY_SPACE, "space"), &defaults);
    let mut runtime = Runtime::new(Box::new(input));
    runtime.add_controller(Controller::new("p1", vec![LogicalDevice::Button(button)]));

    let mut held = Vec::new();
    let mut check = Vec::new();
    let mut negative_edge = Vec::new();
    for _ in 0..4 {
        runtime.tick(DT);
        let button = runtime
            .controller("p1")
            .and_then(|c| c.device("a"))
            .and_then(LogicalDevice::as_button)
            .unwrap();
        held.push(button.held());
        check.push(button.check());
        negative_edge.push(button.negative_edge());
    }

    assert_eq!(held, vec![0, 1, 2, 0]);
    assert_eq!(check, vec![false, true, false, false]);
    assert_eq!(negative_edge, vec![false, false, false, true]);
}

#[test]
fn dpad_double_tap_up() {
    let mut input = ScriptedInput::new(vec![pad()]);
    for hat in [(0, -1), (0, 0), (0, -1), (0, -1), (0, 0), (0, -1)] {
        input.push_with(|s| s.joysticks[0].hats[0] = hat);
    }
    let mut controller = hat_profile()
        .build(&[pad()], &DeviceDefaults::default())
        .unwrap();
    controller
        .add_command(Command::motion("double_tap_up", "dpad", &[(0, -1), (0, 0), (0, -1)], Some(8)).unwrap())
        .unwrap();
    let mut runtime = Runtime::new(Box::new(input));
    runtime.add_controller(controller);

    assert_eq!(fired_on(&mut runtime, 3, "double_tap_up"), vec![3]);
    let frames_left = |runtime: &Runtime| {
        runtime
            .controller("pad")
            .and_then(|c| c.command("double_tap_up"))
            .map(|c| c.frames().len())
    };
    // Ring state as tick 4 begins: tick 4's own frame opens the next match
    assert_eq!(frames_left(&runtime), Some(0));
    assert_eq!(fired_on(&mut runtime, 3, "double_tap_up"), vec![3]);
    assert_eq!(runtime.fired_total(), 2);
}

fn x_is(x: i8) -> impl Fn(&[DeviceValue]) -> bool {
    move |frame| frame[0].direction().is_some_and(|d| d.0 == x)
}

#[test]
fn step_window_tolerance() {
    let mut input = ScriptedInput::new(Vec::new());
    input.push_keys([vec![], vec![KEY_RIGHT], vec![], vec![KEY_LEFT]]);

    let defaults = DeviceDefaults::default();
    let key = |id: u32, name: &str| Button::new(name, Mapping::key(id, name), &defaults);
    let dpad = Dpad::new(
        "dpad",
        key(38, "up"),
        key(40, "down"),
        key(KEY_LEFT, "left"),
        key(KEY_RIGHT, "right"),
    );
    let mut controller = Controller::new("keys", vec![LogicalDevice::Dpad(dpad)]);
    let p = Step::new("p", 2).unwrap().with_condition(x_is(1));
    let q = Step::new("q", 2).unwrap().with_condition(x_is(-1));
    controller
        .add_command(Command::new("pq", vec!["dpad".into()], vec![p, q], None).unwrap())
        .unwrap();
    let mut runtime = Runtime::new(Box::new(input));
    runtime.add_controller(controller);

    assert_eq!(fired_on(&mut runtime, 4, "pq"), vec![4]);
}

fn recorder(bus: &mut EventBus, log: &Rc<RefCell<Vec<(String, u64)>>>) -> tickwork::HandlerId {
    let mut handler = EventHandler::new("target");
    for name in ["a", "b"] {
        let log = log.clone();
        handler.add_method(name, move |ctx, event| {
            log.borrow_mut().push((event.name().to_string(), ctx.tick()))
        });
    }
    bus.register(handler)
}

#[test]
fn listener_response_lands_next_tick() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut bus = EventBus::new();
    let target = recorder(&mut bus, &log);
    let source = bus.register(EventHandler::new("source"));
    bus.listen(
        source,
        Listener::respond("a", ActionTemplate::new(Event::new("b"), target)),
    )
    .unwrap();

    for _ in 0..10 {
        bus.update(DT);
    }
    bus.send(source, Event::new("a")).unwrap();
    bus.update(DT);
    assert!(log.borrow().is_empty());
    bus.update(DT);
    assert_eq!(*log.borrow(), vec![("b".to_string(), 11)]);
}

#[test]
fn listener_pass_lands_same_tick() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut bus = EventBus::new();
    let target = recorder(&mut bus, &log);
    let source = bus.register(EventHandler::new("source"));
    bus.listen(source, Listener::pass("a", target)).unwrap();

    for _ in 0..10 {
        bus.update(DT);
    }
    let event = bus.send(source, Event::new("a")).unwrap();
    assert_eq!(*log.borrow(), vec![("a".to_string(), 10)]);
    assert_eq!(event.handlers_visited(), &[source, target]);
}

#[test]
fn model_fan_out_order() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut model = Model::new();
    for label in ["c1", "c2", "c3"] {
        let calls = calls.clone();
        model.subscribe("v", move |value| calls.borrow_mut().push((label, value.clone())));
    }
    model.set_value("v", 7);
    assert_eq!(
        *calls.borrow(),
        vec![
            ("c1", Value::Int(7)),
            ("c2", Value::Int(7)),
            ("c3", Value::Int(7))
        ]
    );
}

#[test]
fn clock_ordering() {
    let switched_off = Rc::new(Cell::new(0));
    let counter = switched_off.clone();
    let timer = Timer::frames("T", 2)
        .unwrap()
        .on_switch_off(move |_| counter.set(counter.get() + 1));

    let mut clock = Clock::new("world");
    // tick n
    clock.add_timer(timer);
    clock.tick(DT);
    assert_eq!(clock.get("T").map(Timer::value), Some(2.0));
    // tick n + 1
    clock.tick(DT);
    assert_eq!(clock.get("T").map(Timer::value), Some(1.0));
    // tick n + 2
    clock.tick(DT);
    assert_eq!(switched_off.get(), 1);
    assert!(!clock.contains("T"));
    clock.tick(DT);
    assert_eq!(switched_off.get(), 1);
}

#[test]
fn command_drives_model_through_the_bus() {
    let mut input = ScriptedInput::new(Vec::new());
    input.push_keys([vec![KEY_SPACE], vec![], vec![]]);
    let button = Button::new("jump", Mapping::key(KEY_SPACE, "space"), &DeviceDefaults::default());
    let mut controller = Controller::new("keys", vec![LogicalDevice::Button(button)]);
    let press = Step::new("press", 1)
        .unwrap()
        .with_condition(conditions::button_pressed(0));
    controller
        .add_command(Command::new("jump", vec!["jump".into()], vec![press], None).unwrap())
        .unwrap();

    let mut runtime = Runtime::new(Box::new(input));
    runtime.add_controller(controller);
    let model = Model::attach(runtime.bus_mut());
    let shield = ModelChange::ToggleValue {
        name: "shield".into(),
    }
    .action(model)
    .unwrap();
    let game = runtime.bus_mut().register(EventHandler::new("game"));
    runtime
        .bus_mut()
        .listen(game, Listener::respond("jump", shield))
        .unwrap();
    runtime.subscribe(game);

    runtime.tick(DT);
    assert_eq!(runtime.bus().model().get("shield"), None);
    runtime.tick(DT);
    assert_eq!(runtime.bus().model().get("shield"), Some(&Value::Bool(true)));
    runtime.tick(DT);
    assert_eq!(runtime.bus().model().get("shield"), Some(&Value::Bool(true)));
}
