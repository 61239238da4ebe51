//! CD-changer message formats.
//!
//! Every outbound status message starts from a fixed opcode template and carries its
//! fields as single nibbles at fixed offsets (offset 0 is the least-significant
//! nibble). Decimal quantities are stored as BCD digit pairs, tens at the higher
//! offset; times are split into minutes and seconds first.
//!
//! | Message        | Template            | Fields (offset: meaning)                                  |
//! |----------------|---------------------|-----------------------------------------------------------|
//! | Playing track  | `0x990000100000001` | 12: play state, 11/10: track, 7/6: minutes, 5/4: seconds  |
//! | Disc change    | `0x9B000000001`     | 8: status class, 7: disc, 6/5: track, 4: reason           |
//! | Disc info      | `0x9C001000000F`    | 9: disc, 6/5: tracks, 4/3: seconds, 2/1: minutes          |
//! | Changer error  | `0x9F00000`         | 4: severity, 3: sub-code                                  |
//!
//! The enums map to their nibbles and diagnostic labels through one static table
//! each, shared by the encoders, the decoders and log output.
//!
//! Inbound, the head-unit sends short fixed commands (see [`Command`]) and a
//! disc/track selection whose fields are decoded by [`DiskTrackChange::decode`].

use core::fmt;

use crate::consts::{
    CHANGER_ERROR_TEMPLATE, CMD_FAST_FORWARD, CMD_FAST_FORWARD_PAUSED, CMD_FAST_REVERSE,
    CMD_FAST_REVERSE_PAUSED, CMD_PAUSE, CMD_PING, CMD_PLAY, CMD_RESUME, CMD_RESUME_PAUSED,
    CMD_SHUTDOWN, CMD_STOP, DISC_CHANGE_TEMPLATE, DISC_INFO_TEMPLATE, PLAYING_TRACK_TEMPLATE,
    SELECT_PREFIX,
};
use crate::error::MessageError;
use crate::frame::nibble;

const MAX_DISC: u16 = 9;
const MAX_TRACK: u16 = 99;
/// 99 minutes 59 seconds.
const MAX_TIME_SEC: u16 = 99 * 60 + 59;

fn check_range(field: &'static str, value: u16, max: u16) -> Result<(), MessageError> {
    if value > max {
        return Err(MessageError::OutOfRange { field, value, max });
    }
    Ok(())
}

/// Splits a two-digit value into its `(tens, ones)` BCD digits.
fn bcd(value: u16) -> (u8, u8) {
    ((value / 10) as u8, (value % 10) as u8)
}

/// ORs `value` into the nibble at `offset`.
fn put(message: &mut u64, offset: usize, value: u8) {
    *message |= u64::from(value & 0xF) << (offset * 4);
}

fn put_bcd(message: &mut u64, tens_offset: usize, value: u16) {
    let (tens, ones) = bcd(value);
    put(message, tens_offset, tens);
    put(message, tens_offset - 1, ones);
}

/// Reads a BCD digit at `offset`.
fn digit(message: u64, offset: usize, field: &'static str) -> Result<u8, MessageError> {
    let value = nibble(message, offset);
    if value > 9 {
        return Err(MessageError::InvalidDigit { field, value });
    }
    Ok(value)
}

/// Reads a two-digit BCD value whose tens digit sits at `tens_offset`.
fn digits(message: u64, tens_offset: usize, field: &'static str) -> Result<u8, MessageError> {
    Ok(digit(message, tens_offset, field)? * 10 + digit(message, tens_offset - 1, field)?)
}

/// Reads a minutes/seconds pair back into seconds.
fn time(
    message: u64,
    minutes_tens: usize,
    seconds_tens: usize,
    field: &'static str,
) -> Result<u16, MessageError> {
    let minutes = digits(message, minutes_tens, field)?;
    let tens = nibble(message, seconds_tens);
    if tens > 5 {
        return Err(MessageError::InvalidDigit { field, value: tens });
    }
    let seconds = digits(message, seconds_tens, field)?;
    Ok(u16::from(minutes) * 60 + u16::from(seconds))
}

fn check_header(message: u64, shift: usize, header: u64) -> Result<(), MessageError> {
    if message >> (shift * 4) != header {
        return Err(MessageError::HeaderMismatch { message });
    }
    Ok(())
}

/// Playback state reported in the playing-track message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum PlayState {
    /// Getting ready to play.
    Preparing,
    /// Stopped.
    Stopped,
    /// Paused.
    Paused,
    /// Playing.
    Playing,
    /// Disc spinning up.
    Spinup,
    /// Fast forward.
    FastForward,
    /// Fast reverse.
    FastReverse,
}

struct PlayStateEntry {
    state: PlayState,
    nibble: u8,
    label: &'static str,
}

/// Indexed by `PlayState as usize`.
static PLAY_STATES: [PlayStateEntry; 7] = [
    PlayStateEntry { state: PlayState::Preparing, nibble: 0x1, label: "preparing" },
    PlayStateEntry { state: PlayState::Stopped, nibble: 0x2, label: "stopped" },
    PlayStateEntry { state: PlayState::Paused, nibble: 0x3, label: "paused" },
    PlayStateEntry { state: PlayState::Playing, nibble: 0x4, label: "playing" },
    PlayStateEntry { state: PlayState::Spinup, nibble: 0x5, label: "spinup" },
    PlayStateEntry { state: PlayState::FastForward, nibble: 0x6, label: "ffwd" },
    PlayStateEntry { state: PlayState::FastReverse, nibble: 0x7, label: "frev" },
];

impl PlayState {
    fn entry(self) -> &'static PlayStateEntry {
        &PLAY_STATES[self as usize]
    }

    /// Nibble value sent on the wire (1–7).
    pub fn nibble(self) -> u8 {
        self.entry().nibble
    }

    /// Short name for diagnostics.
    pub fn label(self) -> &'static str {
        self.entry().label
    }

    /// Looks up the state sent as `nibble`.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        PLAY_STATES
            .iter()
            .find(|e| e.nibble == nibble)
            .map(|e| e.state)
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress of a disc change, reported in the disc change message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ChangingStatus {
    /// The changer is moving discs.
    InProgress,
    /// There is no magazine loaded.
    NoMagazine,
    /// The requested slot is empty.
    NoDisc,
    /// The requested track does not exist.
    NoTrack,
    /// The requested disc and track are ready.
    Done,
}

struct ChangingStatusEntry {
    status: ChangingStatus,
    class: u8,
    reason: u8,
    carries_track: bool,
    label: &'static str,
}

/// Indexed by `ChangingStatus as usize`.
static CHANGING_STATUSES: [ChangingStatusEntry; 5] = [
    ChangingStatusEntry {
        status: ChangingStatus::InProgress,
        class: 0xD,
        reason: 0x0,
        carries_track: false,
        label: "in progress",
    },
    ChangingStatusEntry {
        status: ChangingStatus::NoMagazine,
        class: 0x4,
        reason: 0x2,
        carries_track: false,
        label: "no mag",
    },
    ChangingStatusEntry {
        status: ChangingStatus::NoDisc,
        class: 0x4,
        reason: 0x4,
        carries_track: false,
        label: "no disc",
    },
    ChangingStatusEntry {
        status: ChangingStatus::NoTrack,
        class: 0x4,
        reason: 0x1,
        carries_track: false,
        label: "no track",
    },
    ChangingStatusEntry {
        status: ChangingStatus::Done,
        class: 0x9,
        reason: 0x0,
        carries_track: true,
        label: "done",
    },
];

impl ChangingStatus {
    fn entry(self) -> &'static ChangingStatusEntry {
        &CHANGING_STATUSES[self as usize]
    }

    /// Status class nibble (offset 8 of the disc change message).
    pub fn class(self) -> u8 {
        self.entry().class
    }

    /// Reason nibble (offset 4 of the disc change message).
    pub fn reason(self) -> u8 {
        self.entry().reason
    }

    /// Whether the message carries the track number for this status.
    pub fn carries_track(self) -> bool {
        self.entry().carries_track
    }

    /// Short name for diagnostics.
    pub fn label(self) -> &'static str {
        self.entry().label
    }

    /// Looks up the status sent as a `(class, reason)` nibble pair.
    pub fn from_nibbles(class: u8, reason: u8) -> Option<Self> {
        CHANGING_STATUSES
            .iter()
            .find(|e| e.class == class && e.reason == reason)
            .map(|e| e.status)
    }
}

impl fmt::Display for ChangingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Changer health reported in the changer error message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ChangerErrorCode {
    /// No error.
    Normal,
    /// The changer is overheating.
    HighTemperature,
    /// A disc could not be changed.
    DiscChangeIssue,
    /// A disc is stuck in the drive.
    StuckDisc,
}

struct ErrorCodeEntry {
    code: ChangerErrorCode,
    severity: u8,
    sub_code: u8,
    label: &'static str,
}

/// Indexed by `ChangerErrorCode as usize`.
static ERROR_CODES: [ErrorCodeEntry; 4] = [
    ErrorCodeEntry {
        code: ChangerErrorCode::Normal,
        severity: 0x0,
        sub_code: 0x0,
        label: "normal",
    },
    ErrorCodeEntry {
        code: ChangerErrorCode::HighTemperature,
        severity: 0x3,
        sub_code: 0x0,
        label: "high temperature",
    },
    ErrorCodeEntry {
        code: ChangerErrorCode::DiscChangeIssue,
        severity: 0x0,
        sub_code: 0x1,
        label: "disc change issue",
    },
    ErrorCodeEntry {
        code: ChangerErrorCode::StuckDisc,
        severity: 0x0,
        sub_code: 0x2,
        label: "stuck disc",
    },
];

impl ChangerErrorCode {
    fn entry(self) -> &'static ErrorCodeEntry {
        &ERROR_CODES[self as usize]
    }

    /// Short name for diagnostics.
    pub fn label(self) -> &'static str {
        self.entry().label
    }

    /// Builds the changer error message.
    pub fn encode(self) -> u64 {
        let entry = self.entry();
        let mut message = CHANGER_ERROR_TEMPLATE;
        put(&mut message, 4, entry.severity);
        put(&mut message, 3, entry.sub_code);
        message
    }

    /// Decodes a changer error message.
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        check_header(message, 5, CHANGER_ERROR_TEMPLATE >> 20)?;
        let severity = nibble(message, 4);
        let sub_code = nibble(message, 3);
        ERROR_CODES
            .iter()
            .find(|e| e.severity == severity && e.sub_code == sub_code)
            .map(|e| e.code)
            .ok_or(MessageError::InvalidDigit {
                field: "error code",
                value: (severity << 4) | sub_code,
            })
    }
}

impl fmt::Display for ChangerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields of the playing-track status message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct PlayingTrack {
    /// Track number, 0–99.
    pub track: u8,
    /// Elapsed time within the track, up to 99:59.
    pub time_sec: u16,
    /// Playback state.
    pub state: PlayState,
}

impl PlayingTrack {
    /// Builds the playing-track message.
    ///
    /// # Errors
    /// [`MessageError::OutOfRange`] if the track is above 99 or the time above 99:59.
    pub fn encode(&self) -> Result<u64, MessageError> {
        check_range("track", u16::from(self.track), MAX_TRACK)?;
        check_range("track time", self.time_sec, MAX_TIME_SEC)?;

        let mut message = PLAYING_TRACK_TEMPLATE;
        put(&mut message, 12, self.state.nibble());
        put_bcd(&mut message, 11, u16::from(self.track));
        put_bcd(&mut message, 7, self.time_sec / 60);
        put_bcd(&mut message, 5, self.time_sec % 60);
        trace!(
            "CDC: track {}, time {}:{}, {}",
            self.track,
            self.time_sec / 60,
            self.time_sec % 60,
            self.state.label()
        );
        Ok(message)
    }

    /// Decodes a playing-track message.
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        check_header(message, 13, PLAYING_TRACK_TEMPLATE >> 52)?;
        let raw_state = nibble(message, 12);
        let state = PlayState::from_nibble(raw_state).ok_or(MessageError::InvalidDigit {
            field: "play state",
            value: raw_state,
        })?;
        Ok(Self {
            track: digits(message, 11, "track")?,
            time_sec: time(message, 7, 5, "track time")?,
            state,
        })
    }
}

/// Fields of the disc change message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DiscChange {
    /// Disc number, 0–9.
    pub disc: u8,
    /// Track number, 0–99. Only sent when the status is [`ChangingStatus::Done`].
    pub track: u8,
    /// Progress of the change.
    pub status: ChangingStatus,
}

impl DiscChange {
    /// Builds the disc change message.
    ///
    /// # Errors
    /// [`MessageError::OutOfRange`] if the disc is above 9 or the track above 99.
    pub fn encode(&self) -> Result<u64, MessageError> {
        check_range("disc", u16::from(self.disc), MAX_DISC)?;
        check_range("track", u16::from(self.track), MAX_TRACK)?;

        let mut message = DISC_CHANGE_TEMPLATE;
        put(&mut message, 8, self.status.class());
        put(&mut message, 7, self.disc);
        if self.status.carries_track() {
            put_bcd(&mut message, 6, u16::from(self.track));
        }
        put(&mut message, 4, self.status.reason());
        trace!(
            "Disc change: t{}, d{}, {}",
            self.track,
            self.disc,
            self.status.label()
        );
        Ok(message)
    }

    /// Decodes a disc change message. The track reads as 0 unless the status carries it.
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        check_header(message, 9, DISC_CHANGE_TEMPLATE >> 36)?;
        let class = nibble(message, 8);
        let reason = nibble(message, 4);
        let status = ChangingStatus::from_nibbles(class, reason).ok_or(
            MessageError::InvalidDigit {
                field: "change status",
                value: class,
            },
        )?;
        let track = if status.carries_track() {
            digits(message, 6, "track")?
        } else {
            0
        };
        Ok(Self {
            disc: digit(message, 7, "disc")?,
            track,
            status,
        })
    }
}

/// Fields of the disc info message.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DiscInfo {
    /// Disc number, 0–9.
    pub disc: u8,
    /// Number of tracks on the disc, 0–99.
    pub total_tracks: u8,
    /// Total playing time of the disc, up to 99:59.
    pub total_time_sec: u16,
}

impl DiscInfo {
    /// Builds the disc info message.
    ///
    /// # Errors
    /// [`MessageError::OutOfRange`] if a field does not fit its digits.
    pub fn encode(&self) -> Result<u64, MessageError> {
        check_range("disc", u16::from(self.disc), MAX_DISC)?;
        check_range("total tracks", u16::from(self.total_tracks), MAX_TRACK)?;
        check_range("total time", self.total_time_sec, MAX_TIME_SEC)?;

        let mut message = DISC_INFO_TEMPLATE;
        put(&mut message, 9, self.disc);
        put_bcd(&mut message, 6, u16::from(self.total_tracks));
        put_bcd(&mut message, 4, self.total_time_sec % 60);
        put_bcd(&mut message, 2, self.total_time_sec / 60);
        Ok(message)
    }

    /// Decodes a disc info message.
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        check_header(message, 10, DISC_INFO_TEMPLATE >> 40)?;
        Ok(Self {
            disc: digit(message, 9, "disc")?,
            total_tracks: digits(message, 6, "total tracks")?,
            total_time_sec: time(message, 2, 4, "total time")?,
        })
    }
}

/// A disc/track selection requested by the head-unit.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DiskTrackChange {
    /// Requested disc, 0–9.
    pub disc: u8,
    /// Requested track, 0–99.
    pub track: u8,
    /// Requested play state, when the command carries one.
    pub play_state: Option<PlayState>,
}

impl DiskTrackChange {
    /// Whether `message` has the shape of a selection command.
    pub fn matches(message: u64) -> bool {
        message >> 16 == SELECT_PREFIX || message >> 20 == SELECT_PREFIX
    }

    /// Decodes a selection command.
    ///
    /// Two layouts are in use: `113dttf` (disc at offset 3, track at 2/1) and
    /// `113dttff` (disc at offset 4, track at 3/2). The short form is tried first.
    ///
    /// # Errors
    /// - [`MessageError::HeaderMismatch`] if neither layout matches
    /// - [`MessageError::InvalidDigit`] if a field is not a decimal digit
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        let (disc_offset, format) = if message >> 16 == SELECT_PREFIX {
            (3, "113dttf")
        } else if message >> 20 == SELECT_PREFIX {
            (4, "113dttff")
        } else {
            warn!("unrecognised disc/track selection: {:x}", message);
            return Err(MessageError::HeaderMismatch { message });
        };
        let change = Self {
            disc: digit(message, disc_offset, "disc")?,
            track: digits(message, disc_offset - 1, "track")?,
            play_state: None,
        };
        debug!(
            "disc/track selection ({}): d={} t={}",
            format, change.disc, change.track
        );
        Ok(change)
    }
}

/// A command received from the head-unit.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// Presence check; answer with [`PING_OK`](crate::consts::PING_OK).
    Ping,
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Stop playback.
    Stop,
    /// Fast forward.
    FastForward,
    /// Fast reverse.
    FastReverse,
    /// Fast forward while paused.
    FastForwardPaused,
    /// Fast reverse while paused.
    FastReversePaused,
    /// Resume playback.
    Resume,
    /// Resume, staying paused.
    ResumePaused,
    /// The head-unit is powering down.
    Shutdown,
    /// Select a disc and track.
    SelectDiscTrack(DiskTrackChange),
}

static COMMANDS: [(u64, Command); 11] = [
    (CMD_PING, Command::Ping),
    (CMD_PLAY, Command::Play),
    (CMD_PAUSE, Command::Pause),
    (CMD_STOP, Command::Stop),
    (CMD_FAST_FORWARD, Command::FastForward),
    (CMD_FAST_REVERSE, Command::FastReverse),
    (CMD_FAST_FORWARD_PAUSED, Command::FastForwardPaused),
    (CMD_FAST_REVERSE_PAUSED, Command::FastReversePaused),
    (CMD_RESUME, Command::Resume),
    (CMD_RESUME_PAUSED, Command::ResumePaused),
    (CMD_SHUTDOWN, Command::Shutdown),
];

impl Command {
    /// Recognises a received message.
    ///
    /// # Errors
    /// - [`MessageError::UnknownCommand`] for anything that is not a known command
    /// - the errors of [`DiskTrackChange::decode`] for a malformed selection
    pub fn decode(message: u64) -> Result<Self, MessageError> {
        if let Some((_, command)) = COMMANDS.iter().find(|(value, _)| *value == message) {
            return Ok(*command);
        }
        if DiskTrackChange::matches(message) {
            return DiskTrackChange::decode(message).map(Command::SelectDiscTrack);
        }
        Err(MessageError::UnknownCommand { message })
    }
}
