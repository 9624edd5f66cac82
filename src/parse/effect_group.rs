use std::cmp;
use std::fmt;

use nom::{self, IResult, Needed, le_f32, le_u16, le_u32};

use ::errors::{ErrorKind, Result, nom_to_result};


/// The only effect group layout anyone has ever written.
pub const FORMAT_VERSION: u32 = 1;
/// Number of texture stages a group describes.  Fixed by the engine, not by the file.
pub const STAGE_SLOTS: usize = 2;
/// Number of default script parameters kept per evaluated stage.
pub const DEFAULT_VALUE_SLOTS: usize = 6;

const STAGE_WHENCE: [&str; STAGE_SLOTS] = ["stage 0 record", "stage 1 record"];

/// What a stage record says about its stage, as stored in the file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StageKind {
    Disabled = 0,
    /// same as some other stage
    Overridden = 1,
    /// computed by a named script
    Evaluated = 2,
}

impl StageKind {
    pub fn from_wire(value: u32) -> Option<StageKind> {
        match value {
            0 => Some(StageKind::Disabled),
            1 => Some(StageKind::Overridden),
            2 => Some(StageKind::Evaluated),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// What to do with a stage kind we don't recognize.  Old loaders quietly treated those as disabled,
/// so that's the default.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strictness {
    Lenient,
    Strict,
}

impl Default for Strictness {
    fn default() -> Self {
        Strictness::Lenient
    }
}

/// One stage record, exactly as it appeared in the buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BareStage<'a> {
    Disabled,
    Overridden {
        channel: u32,
        source_stage: u32,
    },
    Evaluated {
        channel: u32,
        /// Raw script name; not null-terminated and not checked for anything yet
        script: &'a [u8],
        /// First six default values; missing ones are zero
        defaults: [f32; DEFAULT_VALUE_SLOTS],
        /// How many defaults the file claimed to have, which may be more or fewer than six
        default_count: u32,
    },
    /// Kind we don't know.  Nothing past the kind field was consumed.
    Unknown(u32),
}

impl<'a> BareStage<'a> {
    pub fn kind(&self) -> Option<StageKind> {
        match *self {
            BareStage::Disabled => Some(StageKind::Disabled),
            BareStage::Overridden { .. } => Some(StageKind::Overridden),
            BareStage::Evaluated { .. } => Some(StageKind::Evaluated),
            BareStage::Unknown(_) => None,
        }
    }
}

/// Low-level view of a parsed effect group.  Keeps everything the file said, including the parts a
/// `TextureEffectGroup` throws away, which makes it the thing to look at when a file is suspicious.
#[derive(Debug)]
pub struct BareEffectGroup<'a> {
    pub buffer: &'a [u8],
    pub version: u32,
    /// Stage count from the header, before clamping
    pub stage_count: u32,
    /// At most `STAGE_SLOTS` stages, in slot order
    pub stages: Vec<BareStage<'a>>,
    /// Bytes left over after the last stage we read
    pub trailing_bytes: usize,
}

/// Something odd about an effect group that doesn't stop it from loading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// Header claims more stages than there are slots; the extras were ignored
    ExtraStageRecords(u32),
    /// Header claims fewer stages than there are slots; the rest are disabled
    FewerStagesThanSlots(u32),
    UnknownStageKind(usize, u32),
    /// Stage had more than six defaults, and the extras were dropped
    DiscardedDefaults(usize, u32),
    /// Stage had fewer than six defaults, and the rest are zero
    MissingDefaults(usize, u32),
    TrailingBytes(usize),
    OverrideOutOfRange(usize, u32),
    SelfOverride(usize),
    OverrideOfOverride(usize, u32),
    OverrideOfDisabled(usize, u32),
}

impl Diagnostic {
    /// Whether the group is actually broken, as opposed to merely weird.
    pub fn is_error(&self) -> bool {
        match *self {
            Diagnostic::UnknownStageKind(..) |
            Diagnostic::OverrideOutOfRange(..) |
            Diagnostic::SelfOverride(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Diagnostic::ExtraStageRecords(count) =>
                write!(f, "header declares {} stages, only {} were read", count, STAGE_SLOTS),
            Diagnostic::FewerStagesThanSlots(count) =>
                write!(f, "header declares only {} stages; the rest are disabled", count),
            Diagnostic::UnknownStageKind(slot, kind) =>
                write!(f, "stage {} has unknown kind {}", slot, kind),
            Diagnostic::DiscardedDefaults(slot, count) =>
                write!(f, "stage {} has {} default values; only the first {} are kept", slot, count, DEFAULT_VALUE_SLOTS),
            Diagnostic::MissingDefaults(slot, count) =>
                write!(f, "stage {} has only {} default values; the rest are zero", slot, count),
            Diagnostic::TrailingBytes(n) =>
                write!(f, "{} unused bytes after the last stage", n),
            Diagnostic::OverrideOutOfRange(slot, source) =>
                write!(f, "stage {} overrides nonexistent stage {}", slot, source),
            Diagnostic::SelfOverride(slot) =>
                write!(f, "stage {} overrides itself", slot),
            Diagnostic::OverrideOfOverride(slot, source) =>
                write!(f, "stage {} overrides stage {}, which is itself an override", slot, source),
            Diagnostic::OverrideOfDisabled(slot, source) =>
                write!(f, "stage {} overrides stage {}, which is disabled", slot, source),
        }
    }
}

impl<'a> BareEffectGroup<'a> {
    /// Wire-level oddities.  See `TextureEffectGroup::diagnose` for the ones about what the stages
    /// mean.
    pub fn diagnose(&self) -> Vec<Diagnostic> {
        let mut ret = vec![];
        if self.stage_count as usize > STAGE_SLOTS {
            ret.push(Diagnostic::ExtraStageRecords(self.stage_count));
        }
        else if (self.stage_count as usize) < STAGE_SLOTS {
            ret.push(Diagnostic::FewerStagesThanSlots(self.stage_count));
        }

        for (slot, stage) in self.stages.iter().enumerate() {
            match *stage {
                BareStage::Unknown(kind) => {
                    ret.push(Diagnostic::UnknownStageKind(slot, kind));
                }
                BareStage::Evaluated { default_count, .. } => {
                    if default_count as usize > DEFAULT_VALUE_SLOTS {
                        ret.push(Diagnostic::DiscardedDefaults(slot, default_count));
                    }
                    else if (default_count as usize) < DEFAULT_VALUE_SLOTS {
                        ret.push(Diagnostic::MissingDefaults(slot, default_count));
                    }
                }
                _ => {}
            }
        }

        if self.trailing_bytes > 0 {
            ret.push(Diagnostic::TrailingBytes(self.trailing_bytes));
        }
        ret
    }
}


named!(overridden_stage<BareStage>, do_parse!(
    channel: le_u32 >>
    source_stage: le_u32 >>
    (BareStage::Overridden{ channel, source_stage })
));

named!(evaluated_stage<BareStage>, do_parse!(
    channel: le_u32 >>
    script_len: le_u16 >>
    script: take!(script_len as usize) >>
    defaults: default_values >>
    (BareStage::Evaluated{
        channel,
        script,
        defaults: defaults.0,
        default_count: defaults.1,
    })
));

/// Counted list of f32s, of which only the first six are kept.  The rest still have to be read past.
fn default_values(input: &[u8]) -> IResult<&[u8], ([f32; DEFAULT_VALUE_SLOTS], u32)> {
    let (mut input, count) = le_u32(input)?;
    // Check up front, so a garbage count can't make us spin through four billion reads
    let needed = count as u64 * 4;
    if (input.len() as u64) < needed {
        return Err(nom::Err::Incomplete(Needed::Size(cmp::min(needed, usize::max_value() as u64) as usize)));
    }

    let mut defaults = [0.0; DEFAULT_VALUE_SLOTS];
    for i in 0..(count as usize) {
        let (leftovers, value) = le_f32(input)?;
        if i < DEFAULT_VALUE_SLOTS {
            defaults[i] = value;
        }
        input = leftovers;
    }
    Ok((input, (defaults, count)))
}

fn stage_record(input: &[u8]) -> IResult<&[u8], BareStage> {
    let (input, kind) = le_u32(input)?;
    match StageKind::from_wire(kind) {
        Some(StageKind::Disabled) => Ok((input, BareStage::Disabled)),
        Some(StageKind::Overridden) => overridden_stage(input),
        Some(StageKind::Evaluated) => evaluated_stage(input),
        // Nothing tells us how long an unknown record is, so don't guess
        None => Ok((input, BareStage::Unknown(kind))),
    }
}


pub fn parse_effect_group(buf: &[u8]) -> Result<BareEffectGroup> {
    let (rest, version) = nom_to_result("effect group version", buf, le_u32(buf))?;
    if version != FORMAT_VERSION {
        bail!(ErrorKind::UnsupportedVersion(version));
    }
    let (mut rest, stage_count) = nom_to_result("effect group stage count", buf, le_u32(rest))?;

    let readable = cmp::min(stage_count as usize, STAGE_SLOTS);
    if readable < stage_count as usize {
        debug!("effect group declares {} stages, reading only {}", stage_count, readable);
    }

    let mut stages = Vec::with_capacity(readable);
    for slot in 0..readable {
        let (leftovers, stage) = nom_to_result(STAGE_WHENCE[slot], buf, stage_record(rest))?;
        stages.push(stage);
        rest = leftovers;
    }

    Ok(BareEffectGroup{
        buffer: buf,
        version,
        stage_count,
        stages,
        trailing_bytes: rest.len(),
    })
}


#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;
    use ::errors::ErrorKind;

    fn header(stage_count: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(FORMAT_VERSION).unwrap();
        buf.write_u32::<LittleEndian>(stage_count).unwrap();
        buf
    }

    fn push_evaluated(buf: &mut Vec<u8>, channel: u32, script: &[u8], defaults: &[f32]) {
        buf.write_u32::<LittleEndian>(StageKind::Evaluated.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(channel).unwrap();
        buf.write_u16::<LittleEndian>(script.len() as u16).unwrap();
        buf.extend_from_slice(script);
        buf.write_u32::<LittleEndian>(defaults.len() as u32).unwrap();
        for &value in defaults {
            buf.write_f32::<LittleEndian>(value).unwrap();
        }
    }

    #[test]
    fn overridden_then_disabled() {
        let buf = [
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        let bare = parse_effect_group(&buf).unwrap();
        assert_eq!(bare.version, 1);
        assert_eq!(bare.stage_count, 2);
        assert_eq!(bare.stages, vec![
            BareStage::Overridden{ channel: 3, source_stage: 1 },
            BareStage::Disabled,
        ]);
        assert_eq!(bare.trailing_bytes, 0);
        assert!(bare.diagnose().is_empty());
    }

    #[test]
    fn disabled_stage_is_just_its_kind() {
        let mut buf = header(2);
        buf.write_u32::<LittleEndian>(StageKind::Disabled.to_wire()).unwrap();
        push_evaluated(&mut buf, 0, b"", &[]);
        assert_eq!(buf.len(), 26);

        let bare = parse_effect_group(&buf).unwrap();
        assert_eq!(bare.stages[0], BareStage::Disabled);
        assert_eq!(bare.stages[1], BareStage::Evaluated{
            channel: 0,
            script: b"",
            defaults: [0.0; 6],
            default_count: 0,
        });
        assert_eq!(bare.trailing_bytes, 0);
        assert_eq!(bare.diagnose(), vec![Diagnostic::MissingDefaults(1, 0)]);
    }

    #[test]
    fn wrong_version() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(2).unwrap();
        buf.write_u32::<LittleEndian>(2).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();

        let err = parse_effect_group(&buf).unwrap_err();
        match *err.kind() {
            ErrorKind::UnsupportedVersion(2) => {}
            ref other => panic!("expected a version error, got {:?}", other),
        }
    }

    #[test]
    fn version_checked_before_stage_count() {
        let err = parse_effect_group(&[0x07, 0x00, 0x00, 0x00]).unwrap_err();
        match *err.kind() {
            ErrorKind::UnsupportedVersion(7) => {}
            ref other => panic!("expected a version error, got {:?}", other),
        }
    }

    #[test]
    fn truncated_header() {
        for len in 0..8 {
            let buf = header(2);
            let err = parse_effect_group(&buf[..len]).unwrap_err();
            match *err.kind() {
                ErrorKind::TruncatedData(_) => {}
                ref other => panic!("{} bytes: expected truncation, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn truncated_after_stage_count() {
        let buf = header(2);
        assert_eq!(buf.len(), 8);
        let err = parse_effect_group(&buf).unwrap_err();
        match *err.kind() {
            ErrorKind::TruncatedData(whence) => assert_eq!(whence, "stage 0 record"),
            ref other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn truncated_inside_script() {
        let mut buf = header(1);
        push_evaluated(&mut buf, 0, b"Scroll", &[1.0]);
        // Cut right in the middle of the script name
        let cut = 8 + 4 + 4 + 2 + 3;
        let err = parse_effect_group(&buf[..cut]).unwrap_err();
        match *err.kind() {
            ErrorKind::TruncatedData(_) => {}
            ref other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn absurd_default_count_is_truncation() {
        let mut buf = header(1);
        buf.write_u32::<LittleEndian>(StageKind::Evaluated.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(u32::max_value()).unwrap();
        buf.write_f32::<LittleEndian>(1.0).unwrap();

        let err = parse_effect_group(&buf).unwrap_err();
        match *err.kind() {
            ErrorKind::TruncatedData(_) => {}
            ref other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn extra_defaults_are_read_past() {
        let mut buf = header(2);
        push_evaluated(&mut buf, 4, b"Pulse", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        buf.write_u32::<LittleEndian>(StageKind::Overridden.to_wire()).unwrap();
        buf.write_u32::<LittleEndian>(9).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();

        let bare = parse_effect_group(&buf).unwrap();
        assert_eq!(bare.stages[0], BareStage::Evaluated{
            channel: 4,
            script: b"Pulse",
            defaults: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            default_count: 8,
        });
        assert_eq!(bare.stages[1], BareStage::Overridden{ channel: 9, source_stage: 0 });
        assert_eq!(bare.trailing_bytes, 0);
        assert_eq!(bare.diagnose(), vec![Diagnostic::DiscardedDefaults(0, 8)]);
    }

    #[test]
    fn stage_count_is_clamped() {
        let mut buf = header(5);
        for _ in 0..5 {
            buf.write_u32::<LittleEndian>(StageKind::Disabled.to_wire()).unwrap();
        }

        let bare = parse_effect_group(&buf).unwrap();
        assert_eq!(bare.stage_count, 5);
        assert_eq!(bare.stages, vec![BareStage::Disabled, BareStage::Disabled]);
        assert_eq!(bare.trailing_bytes, 12);
        assert_eq!(bare.diagnose(), vec![
            Diagnostic::ExtraStageRecords(5),
            Diagnostic::TrailingBytes(12),
        ]);
    }

    #[test]
    fn no_stages_at_all() {
        let buf = header(0);
        let bare = parse_effect_group(&buf).unwrap();
        assert!(bare.stages.is_empty());
        assert_eq!(bare.diagnose(), vec![Diagnostic::FewerStagesThanSlots(0)]);
    }

    #[test]
    fn unknown_kind_consumes_only_the_kind() {
        let mut buf = header(2);
        buf.write_u32::<LittleEndian>(7).unwrap();
        buf.write_u32::<LittleEndian>(StageKind::Disabled.to_wire()).unwrap();

        let bare = parse_effect_group(&buf).unwrap();
        assert_eq!(bare.stages, vec![BareStage::Unknown(7), BareStage::Disabled]);
        assert_eq!(bare.stages[0].kind(), None);
        assert_eq!(bare.diagnose(), vec![Diagnostic::UnknownStageKind(0, 7)]);
        assert!(bare.diagnose()[0].is_error());
    }

    #[test]
    fn stage_kind_wire_values() {
        for &kind in [StageKind::Disabled, StageKind::Overridden, StageKind::Evaluated].iter() {
            assert_eq!(StageKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(StageKind::from_wire(3), None);
    }
}
