//! `.osr` replay header.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::game::{HitCounts, ModList, Ruleset};
use crate::process::ByteBuffer;

/// Leading fields of a replay file, up to and including the mods.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayHeader {
    pub ruleset: Ruleset,
    pub version: i32,
    pub beatmap_hash: String,
    pub player: String,
    pub replay_hash: String,
    pub hits: HitCounts,
    pub score: i32,
    pub max_combo: u16,
    pub perfect: bool,
    pub mods: ModList,
}

impl ReplayHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ByteBuffer::new(data);
        let mode = buf.read_u8().map_err(truncated)?;
        let ruleset = Ruleset::from_id(i32::from(mode))
            .ok_or_else(|| Error::ReplayParse(format!("Unknown mode {}", mode)))?;

        let version = buf.read_i32().map_err(truncated)?;
        let beatmap_hash = buf.read_prefixed_string().map_err(truncated)?;
        let player = buf.read_prefixed_string().map_err(truncated)?;
        let replay_hash = buf.read_prefixed_string().map_err(truncated)?;

        let mut counts = [0u32; 6];
        for count in &mut counts {
            *count = u32::from(buf.read_u16().map_err(truncated)?);
        }
        let [great, ok, meh, perfect, good, miss] = counts;

        let score = buf.read_i32().map_err(truncated)?;
        let max_combo = buf.read_u16().map_err(truncated)?;
        let perfect_combo = buf.read_bool().map_err(truncated)?;
        let mods = buf.read_i32().map_err(truncated)?;

        Ok(Self {
            ruleset,
            version,
            beatmap_hash,
            player,
            replay_hash,
            hits: HitCounts {
                great,
                ok,
                meh,
                miss,
                perfect,
                good,
                ticks: 0,
            },
            score,
            max_combo,
            perfect: perfect_combo,
            mods: ModList::from_legacy_bits(mods as u32),
        })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&fs::read(path)?)
    }

    /// Whether the header's judgement counts agree with `hits`.
    ///
    /// Tick counters are not part of the header and are ignored.
    pub fn counts_match(&self, hits: &HitCounts) -> bool {
        let same_core = self.hits.core() == hits.core();
        match self.ruleset {
            Ruleset::Osu | Ruleset::Taiko => same_core,
            Ruleset::Catch => same_core && self.hits.good == hits.good,
            Ruleset::Mania => {
                same_core && self.hits.perfect == hits.perfect && self.hits.good == hits.good
            }
        }
    }
}

fn truncated(e: Error) -> Error {
    Error::ReplayParse(e.to_string())
}


#[cfg(test)]
mod tests {
    use super::fixtures::OsrBuilder;
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = ReplayHeader::parse(&OsrBuilder::new("abc").build()).unwrap();

        assert_eq!(header.ruleset, Ruleset::Osu);
        assert_eq!(header.version, 20240101);
        assert_eq!(header.beatmap_hash, "abc");
        assert_eq!(header.player, "player");
        assert_eq!(header.replay_hash, "feedface");
        assert_eq!(header.hits.core(), [95, 4, 0, 1]);
        assert_eq!(header.hits.perfect, 10);
        assert_eq!(header.hits.good, 2);
        assert_eq!(header.score, 123_456);
        assert_eq!(header.max_combo, 80);
        assert!(!header.perfect);
        assert!(header.mods.contains("HD"));
    }

    #[test]
    fn test_truncated_header() {
        let data = OsrBuilder::new("abc").build();
        let err = ReplayHeader::parse(&data[..20]).unwrap_err();
        assert!(matches!(err, Error::ReplayParse(_)));
    }

    #[test]
    fn test_unknown_mode() {
        let mut builder = OsrBuilder::new("abc");
        builder.mode = 9;
        assert!(ReplayHeader::parse(&builder.build()).is_err());
    }

    #[test]
    fn test_counts_match() {
        let header = ReplayHeader::parse(&OsrBuilder::new("abc").build()).unwrap();
        let mut hits = HitCounts {
            great: 95,
            ok: 4,
            meh: 0,
            miss: 1,
            ..Default::default()
        };
        assert!(header.counts_match(&hits));

        hits.miss = 2;
        assert!(!header.counts_match(&hits));
    }

    #[test]
    fn test_mania_compares_extra_slots() {
        let mut builder = OsrBuilder::new("abc");
        builder.mode = 3;
        let header = ReplayHeader::parse(&builder.build()).unwrap();

        let hits = HitCounts {
            great: 95,
            ok: 4,
            miss: 1,
            ..Default::default()
        };
        assert!(!header.counts_match(&hits));
        assert!(header.counts_match(&HitCounts {
            perfect: 10,
            good: 2,
            ..hits
        }));
    }
}
