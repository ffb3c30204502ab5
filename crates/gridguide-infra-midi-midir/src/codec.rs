use gridguide_ports::midi::MidiMessage;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const KEY_PRESSURE: u8 = 0xA0;
const CONTROL_CHANGE: u8 = 0xB0;

/// Decodes one message. Channel voice messages the session reads are
/// decoded into their variants; anything else of up to three bytes is kept
/// as `Other` so it can be forwarded untouched.
pub fn decode_message(bytes: &[u8]) -> Option<MidiMessage> {
    let status = *bytes.first()?;
    let channel = status & 0x0F;
    let message = match (status & 0xF0, bytes) {
        (NOTE_OFF, &[_, note, _]) | (NOTE_ON, &[_, note, 0]) => MidiMessage::NoteOff { channel, note },
        (NOTE_ON, &[_, note, velocity]) => MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        },
        (KEY_PRESSURE, &[_, note, pressure]) => MidiMessage::KeyPressure {
            channel,
            note,
            pressure,
        },
        (CONTROL_CHANGE, &[_, controller, value]) => {
            MidiMessage::from_control_change(channel, controller, value)
        }
        _ => MidiMessage::raw(bytes)?,
    };
    Some(message)
}

pub fn encode_message(message: MidiMessage) -> Vec<u8> {
    let (status, data1, data2) = match message {
        MidiMessage::NoteOn {
            note, velocity, ..
        } => (NOTE_ON, note, velocity),
        MidiMessage::NoteOff { note, .. } => (NOTE_OFF, note, 0),
        MidiMessage::ControlChange {
            controller, value, ..
        }
        | MidiMessage::ParameterResponse {
            controller, value, ..
        } => (CONTROL_CHANGE, controller, value),
        MidiMessage::KeyPressure { note, pressure, .. } => (KEY_PRESSURE, note, pressure),
        MidiMessage::Other { bytes, len } => return bytes[..len as usize].to_vec(),
    };
    let channel = message.channel().unwrap_or(0);
    vec![status | (channel & 0x0F), data1 & 0x7F, data2 & 0x7F]
}
