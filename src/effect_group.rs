use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::u16;

use byteorder::{LittleEndian, WriteBytesExt};

use ::errors::{ErrorKind, Result};
use ::parse::effect_group::{
    BareEffectGroup, BareStage, Diagnostic, StageKind, Strictness, parse_effect_group,
    DEFAULT_VALUE_SLOTS, FORMAT_VERSION, STAGE_SLOTS,
};


/// How one texture stage gets its effect.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    Disabled,
    /// Behaves exactly like another stage.  The index isn't checked against anything; see
    /// `TextureEffectGroup::diagnose`.
    Overridden {
        channel: u32,
        source_stage: u32,
    },
    /// Computed by a named script, which gets `defaults` as its parameters.  The script name is
    /// kept as the raw bytes from the file; old editors wrote whatever codepage they liked.
    Evaluated {
        channel: u32,
        script: Vec<u8>,
        defaults: [f32; DEFAULT_VALUE_SLOTS],
    },
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Disabled
    }
}

impl Stage {
    pub fn overridden(channel: u32, source_stage: u32) -> Self {
        Stage::Overridden{ channel, source_stage }
    }

    /// Build an evaluated stage.  Only the first six `defaults` are used; missing ones are zero.
    pub fn evaluated<S: Into<Vec<u8>>>(channel: u32, script: S, defaults: &[f32]) -> Self {
        let mut slots = [0.0; DEFAULT_VALUE_SLOTS];
        for (slot, &value) in slots.iter_mut().zip(defaults.iter()) {
            *slot = value;
        }
        Stage::Evaluated{ channel, script: script.into(), defaults: slots }
    }

    pub fn kind(&self) -> StageKind {
        match *self {
            Stage::Disabled => StageKind::Disabled,
            Stage::Overridden { .. } => StageKind::Overridden,
            Stage::Evaluated { .. } => StageKind::Evaluated,
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != Stage::Disabled
    }

    pub fn is_overridden(&self) -> bool {
        match *self {
            Stage::Overridden { .. } => true,
            _ => false,
        }
    }

    pub fn channel(&self) -> Option<u32> {
        match *self {
            Stage::Disabled => None,
            Stage::Overridden { channel, .. } | Stage::Evaluated { channel, .. } => Some(channel),
        }
    }

    pub fn source_stage(&self) -> Option<u32> {
        match *self {
            Stage::Overridden { source_stage, .. } => Some(source_stage),
            _ => None,
        }
    }

    pub fn script(&self) -> Option<&[u8]> {
        match *self {
            Stage::Evaluated { ref script, .. } => Some(&script[..]),
            _ => None,
        }
    }

    /// Script name for showing to people.  Bytes that aren't UTF-8 come out as replacement
    /// characters.
    pub fn script_str(&self) -> Option<Cow<str>> {
        self.script().map(String::from_utf8_lossy)
    }

    pub fn defaults(&self) -> Option<&[f32; DEFAULT_VALUE_SLOTS]> {
        match *self {
            Stage::Evaluated { ref defaults, .. } => Some(defaults),
            _ => None,
        }
    }

    fn from_bare(slot: usize, bare: &BareStage, strictness: Strictness) -> Result<Self> {
        Ok(match *bare {
            BareStage::Disabled => Stage::Disabled,
            BareStage::Overridden { channel, source_stage } => Stage::Overridden{ channel, source_stage },
            BareStage::Evaluated { channel, script, defaults, .. } => {
                Stage::Evaluated{ channel, script: script.to_vec(), defaults }
            }
            BareStage::Unknown(kind) => {
                if strictness == Strictness::Strict {
                    bail!(ErrorKind::UnknownStageKind(slot, kind));
                }
                warn!("stage {} has unknown kind {}; treating it as disabled", slot, kind);
                Stage::Disabled
            }
        })
    }

    fn check_encodable(&self, slot: usize) -> Result<()> {
        if let Stage::Evaluated { ref script, .. } = *self {
            if script.len() > u16::MAX as usize {
                bail!(ErrorKind::ScriptTooLong(slot, script.len()));
            }
        }
        Ok(())
    }

    fn write_to(&self, slot: usize, writer: &mut Write) -> Result<()> {
        self.check_encodable(slot)?;
        writer.write_u32::<LittleEndian>(self.kind().to_wire())?;
        match *self {
            Stage::Disabled => {}
            Stage::Overridden { channel, source_stage } => {
                writer.write_u32::<LittleEndian>(channel)?;
                writer.write_u32::<LittleEndian>(source_stage)?;
            }
            Stage::Evaluated { channel, ref script, ref defaults } => {
                writer.write_u32::<LittleEndian>(channel)?;
                writer.write_u16::<LittleEndian>(script.len() as u16)?;
                writer.write_all(script)?;
                writer.write_u32::<LittleEndian>(DEFAULT_VALUE_SLOTS as u32)?;
                for &value in defaults.iter() {
                    writer.write_f32::<LittleEndian>(value)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Stage::Disabled => write!(f, "disabled"),
            Stage::Overridden { channel, source_stage } =>
                write!(f, "channel {}, same as stage {}", channel, source_stage),
            Stage::Evaluated { channel, ref script, ref defaults } =>
                write!(f, "channel {}, script {:?}, defaults {:?}", channel, String::from_utf8_lossy(script), defaults),
        }
    }
}


/// The effects applied to both texture stages of a surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureEffectGroup {
    pub stages: [Stage; STAGE_SLOTS],
}

impl TextureEffectGroup {
    pub fn new() -> Self {
        TextureEffectGroup::default()
    }

    /// Decode a group, treating unknown stage kinds as disabled.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        TextureEffectGroup::from_bytes_with(buf, Strictness::Lenient)
    }

    pub fn from_bytes_with(buf: &[u8], strictness: Strictness) -> Result<Self> {
        let bare = parse_effect_group(buf)?;
        TextureEffectGroup::from_bare(&bare, strictness)
    }

    /// Slots the file didn't have a record for stay disabled.
    pub fn from_bare(bare: &BareEffectGroup, strictness: Strictness) -> Result<Self> {
        let mut group = TextureEffectGroup::new();
        for (slot, bare_stage) in bare.stages.iter().enumerate().take(STAGE_SLOTS) {
            group.stages[slot] = Stage::from_bare(slot, bare_stage, strictness)?;
        }
        Ok(group)
    }

    /// Write the group in the current format.  Nothing at all is written if any stage can't be
    /// encoded.
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        for (slot, stage) in self.stages.iter().enumerate() {
            stage.check_encodable(slot)?;
        }

        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(STAGE_SLOTS as u32)?;
        for (slot, stage) in self.stages.iter().enumerate() {
            stage.write_to(slot, writer)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Problems with how the stages refer to each other.
    pub fn diagnose(&self) -> Vec<Diagnostic> {
        let mut ret = vec![];
        for (slot, stage) in self.stages.iter().enumerate() {
            let source = match stage.source_stage() {
                Some(source) => source,
                None => continue,
            };
            if source as usize >= STAGE_SLOTS {
                ret.push(Diagnostic::OverrideOutOfRange(slot, source));
            }
            else if source as usize == slot {
                ret.push(Diagnostic::SelfOverride(slot));
            }
            else {
                match self.stages[source as usize] {
                    Stage::Disabled => ret.push(Diagnostic::OverrideOfDisabled(slot, source)),
                    Stage::Overridden { .. } => ret.push(Diagnostic::OverrideOfOverride(slot, source)),
                    Stage::Evaluated { .. } => {}
                }
            }
        }
        ret
    }
}

impl fmt::Display for TextureEffectGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (slot, stage) in self.stages.iter().enumerate() {
            writeln!(f, "stage {}: {}", slot, stage)?;
        }
        Ok(())
    }
}

/// Decode a whole effect group from a buffer.
pub fn decode_effect_group(buf: &[u8]) -> Result<TextureEffectGroup> {
    TextureEffectGroup::from_bytes(buf)
}

/// Encode a whole effect group into a fresh buffer.
pub fn encode_effect_group(group: &TextureEffectGroup) -> Result<Vec<u8>> {
    group.to_bytes()
}
