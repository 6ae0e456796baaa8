//! Screen classification.
//!
//! Every screen holds a reference to the game's API object, each type at its
//! own field offset. Finding the API reference at a type's offset identifies
//! the screen's type without reading its method table.

use strum::IntoStaticStr;

use crate::game::GameState;
use crate::process::{MemoryEngine, ReadMemory};
use crate::reader::lazer::layout::LazerLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ScreenKind {
    Player,
    Results,
    SongSelect,
    Editor,
    Multiplayer,
    /// A screen no known type check recognises (main menu, settings, ...).
    Other,
}

impl ScreenKind {
    pub fn state(&self) -> GameState {
        match self {
            Self::Player => GameState::Playing,
            Self::Results => GameState::ResultsScreen,
            Self::SongSelect => GameState::SongSelect,
            Self::Editor => GameState::Editor,
            Self::Multiplayer => GameState::Multiplayer,
            Self::Other => GameState::Menu,
        }
    }
}

impl<R: ReadMemory> MemoryEngine<R> {
    /// Top of the game's screen stack, 0 when empty or unreadable.
    pub(crate) fn current_screen(&self, layout: &LazerLayout, game: u64) -> u64 {
        let c = &layout.collections;
        let stack = self.follow(game, &[layout.game.screen_stack, layout.game.stack]);
        if stack == 0 {
            return 0;
        }
        let size = self.read_i32(stack.wrapping_add_signed(c.stack_size));
        if size <= 0 {
            return 0;
        }
        let array = self.read_ptr(stack.wrapping_add_signed(c.stack_array));
        self.read_pointer_array(array, size as usize)
            .last()
            .copied()
            .unwrap_or(0)
    }

    /// Match `screen` against each known screen type.
    pub(crate) fn classify_screen(&self, layout: &LazerLayout, api: u64, screen: u64) -> ScreenKind {
        if api == 0 || screen == 0 {
            return ScreenKind::Other;
        }
        let s = &layout.screens;
        let candidates = [
            (s.player, ScreenKind::Player),
            (s.results, ScreenKind::Results),
            (s.song_select, ScreenKind::SongSelect),
            (s.editor, ScreenKind::Editor),
            (s.multiplayer, ScreenKind::Multiplayer),
        ];
        candidates
            .into_iter()
            .find(|&(offset, _)| self.read_ptr(screen.wrapping_add_signed(offset)) == api)
            .map(|(_, kind)| kind)
            .unwrap_or(ScreenKind::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Architecture, MockMemoryBuilder};

    #[test]
    fn test_classify_by_api_field() {
        // api object @0x2000, screens @0x0000 (player) and @0x1000 (results)
        let b = MockMemoryBuilder::new().base(0x20_0000).with_size(0x3000);
        let layout = LazerLayout::default();
        let memory = b
            .clone()
            .write_ref(layout.screens.player as usize, 0x2000)
            .write_ref(0x1000 + layout.screens.results as usize, 0x2000)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);
        let api = b.addr(0x2000);

        assert_eq!(engine.classify_screen(&layout, api, b.addr(0)), ScreenKind::Player);
        assert_eq!(
            engine.classify_screen(&layout, api, b.addr(0x1000)),
            ScreenKind::Results
        );
        assert_eq!(engine.classify_screen(&layout, api, b.addr(0x1800)), ScreenKind::Other);
        assert_eq!(ScreenKind::Other.state(), GameState::Menu);
    }

    #[test]
    fn test_current_screen_is_stack_top() {
        // game @0x0 -> screen stack @0x800 -> Stack<T> @0xC00 -> array @0xD00
        let b = MockMemoryBuilder::new().base(0x20_0000).with_size(0x1000);
        let layout = LazerLayout::default();
        let memory = b
            .clone()
            .write_ref(layout.game.screen_stack as usize, 0x800)
            .write_ref(0x800 + layout.game.stack as usize, 0xC00)
            .write_ref(0xC08, 0xD00)
            .write_i32(0xC10, 2)
            .write_i32(0xD08, 4)
            .write_u64(0xD10, 0x1111_0000)
            .write_u64(0xD18, 0x2222_0000)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        assert_eq!(engine.current_screen(&layout, b.addr(0)), 0x2222_0000);
    }
}
