use crate::hmi::{Field, HmiVector, index};
use crate::types::*;

pub(crate) fn diff_fields(
    previous: &HmiVector,
    current: &HmiVector,
    changes: &mut Vec<(usize, Field, Field)>,
) {
    for (i, (prev, curr)) in previous
        .fields()
        .iter()
        .zip(current.fields().iter())
        .enumerate()
    {
        if prev != curr {
            changes.push((i, *prev, *curr));
        }
    }
}

pub(crate) fn map_typed_event(field: usize, state: &DeviceState) -> Option<Event> {
    match field {
        index::POWER => Some(Event::PowerChanged { on: state.power? }),
        index::TARGET_TEMPERATURE => Some(Event::TargetTemperatureChanged {
            temp: state.target_temperature?,
        }),
        index::CURRENT_TEMPERATURE => Some(Event::CurrentTemperatureChanged {
            temp: state.current_temperature?,
        }),
        index::OPERATION_MODE => Some(Event::ModeChanged { mode: state.mode? }),
        index::FAN_SPEED => Some(Event::FanSpeedChanged {
            speed: state.fan_speed?,
        }),
        index::ECO | index::TURBO | index::NIGHT => Some(Event::SpecialModeChanged {
            mode: state.special_mode,
        }),
        index::FIRMWARE => Some(Event::FirmwareChanged {
            revision: state.firmware?,
        }),
        _ => None,
    }
}

/// Typed events for everything that differs between the previous report and
/// `current`. Reserved slots produce no events.
pub(crate) fn state_events(previous: &HmiVector, current: &DeviceState) -> Vec<Event> {
    let mut changes = Vec::new();
    diff_fields(previous, &current.raw, &mut changes);

    let mut events = Vec::new();
    for (i, _old, _new) in changes {
        if let Some(evt) = map_typed_event(i, current)
            && !events.contains(&evt)
        {
            events.push(evt);
        }
    }
    events
}
