//! Mod identification.
//!
//! A mod instance carries no readable acronym in the general case, only its
//! method table. The identity map pairs method tables with acronyms once per
//! ruleset, from the ordered list of mods the game offers.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::game::{DifficultyOverrides, ModList, Ruleset, expected_acronyms};
use crate::process::{MemoryEngine, ReadMemory};
use crate::reader::lazer::layout::LazerLayout;

/// Largest plausible number of children of a composite mod.
const MAX_MULTI_MOD_CHILDREN: usize = 16;

/// A mod instance as found in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModHandle {
    pub instance: u64,
    /// Method table shared by all instances of the mod type.
    pub identity: u64,
    /// Embedded acronym, when the layout exposes one.
    pub acronym: Option<String>,
}

/// Method table -> acronym, valid for a single ruleset.
#[derive(Debug, Default)]
pub struct ModIdentityMap {
    ruleset: Option<Ruleset>,
    acronyms: HashMap<u64, String>,
    builds: usize,
}

impl ModIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ruleset the map was built for.
    pub fn ruleset(&self) -> Option<Ruleset> {
        self.ruleset
    }

    pub fn is_built_for(&self, ruleset: Ruleset) -> bool {
        self.ruleset == Some(ruleset) && !self.acronyms.is_empty()
    }

    /// Number of times the map was (re)built.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn invalidate(&mut self) {
        self.ruleset = None;
        self.acronyms.clear();
    }

    /// Build from the flattened available mods of `ruleset`, in game order.
    ///
    /// Embedded acronyms win; otherwise handles are paired with the expected
    /// acronym at the same position.
    pub fn build(&mut self, ruleset: Ruleset, handles: &[ModHandle]) {
        self.invalidate();
        let expected = expected_acronyms(ruleset);
        if handles.len() != expected.len() {
            warn!(
                "{} mods available for {}, expected {}; positional names may be off",
                handles.len(),
                ruleset,
                expected.len()
            );
        }

        for (i, handle) in handles.iter().enumerate() {
            let acronym = handle
                .acronym
                .clone()
                .or_else(|| expected.get(i).map(|a| a.to_string()));
            if let Some(acronym) = acronym {
                self.acronyms.entry(handle.identity).or_insert(acronym);
            }
        }

        self.ruleset = Some(ruleset);
        self.builds += 1;
        debug!("Mod identity map built for {} ({} entries)", ruleset, self.acronyms.len());
    }

    pub fn acronym(&self, identity: u64) -> Option<&str> {
        self.acronyms.get(&identity).map(String::as_str)
    }

    /// Name a selected mod: embedded acronym first, then the map.
    pub fn resolve(&self, handle: &ModHandle) -> Option<String> {
        handle
            .acronym
            .clone()
            .or_else(|| self.acronym(handle.identity).map(str::to_string))
    }
}

fn is_acronym(text: &str) -> bool {
    (1..=4).contains(&text.len())
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

impl<R: ReadMemory> MemoryEngine<R> {
    /// Handle for a mod instance, `None` for null or garbage pointers.
    pub(crate) fn mod_handle(&self, layout: &LazerLayout, instance: u64) -> Option<ModHandle> {
        if !self.is_valid_pointer(instance) {
            return None;
        }
        let identity = self.read_ptr(instance);
        if !self.is_valid_pointer(identity) {
            return None;
        }
        let acronym = layout
            .mods
            .acronym
            .map(|offset| self.read_string_field(instance.wrapping_add_signed(offset)))
            .filter(|text| is_acronym(text));
        Some(ModHandle {
            instance,
            identity,
            acronym,
        })
    }

    /// Children of a composite mod, or `None` for a plain mod.
    ///
    /// A composite holds an array of 2..=16 distinct mod instances, each with
    /// a type different from the container's.
    fn multi_mod_children(&self, layout: &LazerLayout, instance: u64) -> Option<Vec<u64>> {
        let array = self.read_ptr(instance.wrapping_add_signed(layout.mods.multi_mods));
        if !self.is_valid_pointer(array) {
            return None;
        }
        let length = self.array_length(array);
        if !(2..=MAX_MULTI_MOD_CHILDREN).contains(&length) {
            return None;
        }

        let own_type = self.read_ptr(instance);
        let children = self.read_pointer_array(array, length);
        let mut types = Vec::with_capacity(children.len());
        for &child in &children {
            if !self.is_valid_pointer(child) || child == instance {
                return None;
            }
            let child_type = self.read_ptr(child);
            if !self.is_valid_pointer(child_type) || child_type == own_type {
                return None;
            }
            if types.contains(&child_type) {
                return None;
            }
            types.push(child_type);
        }
        Some(children)
    }

    /// Expand composite mods into their leaves, preserving order.
    pub(crate) fn flatten_mods(&self, layout: &LazerLayout, instances: &[u64]) -> Vec<ModHandle> {
        let mut out = Vec::new();
        for &instance in instances {
            match self.multi_mod_children(layout, instance) {
                Some(children) => {
                    out.extend(children.iter().filter_map(|&c| self.mod_handle(layout, c)))
                }
                None => out.extend(self.mod_handle(layout, instance)),
            }
        }
        out
    }

    /// Custom rate of a rate-adjust mod, when it differs from the mod's default.
    fn speed_change(&self, layout: &LazerLayout, handle: &ModHandle, default: f64) -> Option<f64> {
        let bindable = self.read_ptr(handle.instance.wrapping_add_signed(layout.mods.speed_change));
        if bindable == 0 {
            return None;
        }
        let rate = self.read_f64(bindable.wrapping_add_signed(layout.collections.number_value));
        (rate > 0.0 && (rate - default).abs() > 1e-6).then_some(rate)
    }

    fn difficulty_setting(&self, layout: &LazerLayout, handle: &ModHandle, field: i64) -> Option<f32> {
        let bindable = self.read_ptr(handle.instance.wrapping_add_signed(field));
        if bindable == 0 {
            return None;
        }
        let slot = bindable.wrapping_add_signed(layout.collections.nullable_value);
        self.read_bool(slot).then(|| self.read_f32(slot + 4))
    }

    /// Resolve selected mod instances into a [`ModList`] with settings.
    pub(crate) fn read_mod_list(
        &self,
        layout: &LazerLayout,
        identities: &ModIdentityMap,
        instances: &[u64],
    ) -> ModList {
        let mut mods = ModList::default();
        for handle in self.flatten_mods(layout, instances) {
            let Some(acronym) = identities.resolve(&handle) else {
                debug!("Unknown mod type {:#x}", handle.identity);
                continue;
            };

            match acronym.as_str() {
                "DT" | "NC" => mods.speed_change = self.speed_change(layout, &handle, 1.5),
                "HT" | "DC" => mods.speed_change = self.speed_change(layout, &handle, 0.75),
                "DA" => {
                    let m = &layout.mods;
                    mods.difficulty = DifficultyOverrides {
                        cs: self.difficulty_setting(layout, &handle, m.circle_size),
                        ar: self.difficulty_setting(layout, &handle, m.approach_rate),
                        od: self.difficulty_setting(layout, &handle, m.overall_difficulty),
                        hp: self.difficulty_setting(layout, &handle, m.drain_rate),
                    };
                }
                _ => {}
            }
            mods.acronyms.push(acronym);
        }
        mods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Architecture, MockMemoryBuilder};

    const BASE: u64 = 0x20_0000;

    fn handle(identity: u64) -> ModHandle {
        ModHandle {
            instance: identity + 0x100,
            identity,
            acronym: None,
        }
    }

    #[test]
    fn test_positional_build() {
        let mut map = ModIdentityMap::new();
        map.build(Ruleset::Osu, &[handle(0xA000), handle(0xB000), handle(0xC000)]);

        assert!(map.is_built_for(Ruleset::Osu));
        assert!(!map.is_built_for(Ruleset::Taiko));
        assert_eq!(map.acronym(0xA000), Some("EZ"));
        assert_eq!(map.acronym(0xB000), Some("NF"));
        assert_eq!(map.acronym(0xC000), Some("HT"));
        assert_eq!(map.acronym(0xD000), None);
    }

    #[test]
    fn test_embedded_acronym_wins() {
        let mut map = ModIdentityMap::new();
        let named = ModHandle {
            acronym: Some("HD".to_string()),
            ..handle(0xA000)
        };
        map.build(Ruleset::Osu, &[named]);
        assert_eq!(map.acronym(0xA000), Some("HD"));
    }

    #[test]
    fn test_same_identity_means_different_mod_per_ruleset() {
        let mut map = ModIdentityMap::new();
        let handles = [handle(0xA000), handle(0xB000), handle(0xC000), handle(0xD000), handle(0xE000)];

        map.build(Ruleset::Osu, &handles);
        assert_eq!(map.acronym(0xE000), Some("HR"));

        map.build(Ruleset::Taiko, &handles);
        assert_eq!(map.acronym(0xE000), Some("SG"));
        assert_eq!(map.builds(), 2);
    }

    #[test]
    fn test_is_acronym() {
        assert!(is_acronym("DT"));
        assert!(is_acronym("SV2"));
        assert!(!is_acronym(""));
        assert!(!is_acronym("hidden"));
    }

    #[test]
    fn test_flatten_multi_mod() {
        // composite @0x100 (type 0x900) with Mods array @0x200 -> [0x300, 0x400]
        // plain mod @0x500 (type 0xC00)
        let b = MockMemoryBuilder::new().base(BASE).with_size(0x1000);
        let memory = b
            .clone()
            .write_ref(0x100, 0x900)
            .write_ref(0x110, 0x200)
            .write_i32(0x208, 2)
            .write_ref(0x210, 0x300)
            .write_ref(0x218, 0x400)
            .write_ref(0x300, 0xA00)
            .write_ref(0x400, 0xB00)
            .write_ref(0x500, 0xC00)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);
        let layout = LazerLayout::default();

        let leaves = engine.flatten_mods(&layout, &[b.addr(0x100), b.addr(0x500)]);
        let identities: Vec<u64> = leaves.iter().map(|h| h.identity).collect();
        assert_eq!(identities, vec![b.addr(0xA00), b.addr(0xB00), b.addr(0xC00)]);
    }

    #[test]
    fn test_single_child_array_is_not_composite() {
        let b = MockMemoryBuilder::new().base(BASE).with_size(0x1000);
        let memory = b
            .clone()
            .write_ref(0x100, 0x900)
            .write_ref(0x110, 0x200)
            .write_i32(0x208, 1)
            .write_ref(0x210, 0x300)
            .write_ref(0x300, 0xA00)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        let leaves = engine.flatten_mods(&LazerLayout::default(), &[b.addr(0x100)]);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].identity, b.addr(0x900));
    }

    #[test]
    fn test_settings_are_read() {
        // DT @0x100 (type 0xA00) with SpeedChange bindable @0x200 = 1.3
        // DA @0x300 (type 0xB00) with ApproachRate bindable @0x400 = Some(10.5)
        let b = MockMemoryBuilder::new().base(BASE).with_size(0x1000);
        let memory = b
            .clone()
            .write_ref(0x100, 0xA00)
            .write_ref(0x110, 0x200)
            .write_f64(0x240, 1.3)
            .write_ref(0x300, 0xB00)
            .write_ref(0x320, 0x400)
            .write_u8(0x440, 1)
            .write_f32(0x444, 10.5)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);
        let layout = LazerLayout::default();

        let mut identities = ModIdentityMap::new();
        identities.build(
            Ruleset::Osu,
            &[
                ModHandle {
                    instance: 0,
                    identity: b.addr(0xA00),
                    acronym: Some("DT".to_string()),
                },
                ModHandle {
                    instance: 0,
                    identity: b.addr(0xB00),
                    acronym: Some("DA".to_string()),
                },
            ],
        );

        let mods = engine.read_mod_list(&layout, &identities, &[b.addr(0x100), b.addr(0x300)]);
        assert_eq!(mods.acronyms, vec!["DT", "DA"]);
        assert_eq!(mods.speed_change, Some(1.3));
        assert_eq!(mods.difficulty.ar, Some(10.5));
        assert_eq!(mods.difficulty.cs, None);
    }
}
