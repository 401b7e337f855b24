use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

use static_assertions::{const_assert, const_assert_eq};

pub const REGION_MAGIC: u32 = 0x4753_5152; // "GSQR"
pub const LAYOUT_VERSION: u32 = 1;

pub const MAX_SECTIONS: usize = 64;
pub const MAX_LAYERS_PER_SECTION: usize = 4;
pub const MAX_COLS_PER_LAYER: usize = 4;
pub const MAX_SAMPLE_SLOTS: usize = 26;
pub const MAX_SEQUENCER_STEPS: usize = 2048;
pub const MAX_SEQUENCER_COLS: usize = 16;

pub const DEFAULT_SECTION_STEPS: i32 = 16;
pub const DEFAULT_SECTION_LOOPS: i32 = 4;
pub const MIN_SECTION_LOOPS: i32 = 1;
pub const MAX_SECTION_LOOPS: i32 = 1024;
pub const DEFAULT_BPM: i32 = 120;
pub const MIN_BPM: i32 = 1;
pub const MAX_BPM: i32 = 300;

pub const SAMPLE_MAX_ID: usize = 128;
pub const SAMPLE_MAX_PATH: usize = 512;
pub const SAMPLE_MAX_NAME: usize = 128;

/// A version counter followed by the payload it protects.
///
/// Even version = stable, odd version = a writer is mutating the payload.
#[repr(C)]
pub struct SeqlockBlock<P> {
    pub(crate) version: AtomicU32,
    pub(crate) payload: UnsafeCell<P>,
}

// Mutation only happens through the single `SeqlockWriter` handed out by the
// region; readers copy the payload and validate against `version`.
unsafe impl<P: Copy + Send> Sync for SeqlockBlock<P> {}

impl<P> SeqlockBlock<P> {
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }
}

pub type PlaybackBlock = SeqlockBlock<PlaybackState>;
pub type SampleBankBlock = SeqlockBlock<SampleBankState>;
pub type TableBlock = SeqlockBlock<TableState>;

/// Plain-data payloads stored behind a seqlock in the shared region.
///
/// # Safety
///
/// The all-zero bit pattern must be a valid value of the implementing type,
/// and the type must not contain pointers or interior mutability.
pub unsafe trait BlockPayload: Copy + Send + 'static {
    const NAME: &'static str;

    fn block(region: &RegionLayout) -> &SeqlockBlock<Self>;

    /// Overwrite every field with the documented reader fallback.
    fn write_fallback(out: &mut Self);

    /// Overwrite every field with the value the engine publishes at init.
    fn write_initial(out: &mut Self) {
        Self::write_fallback(out);
    }
}

/// Largest payload a by-value read may copy onto the stack.
pub const MAX_STACK_PAYLOAD: usize = 64 * 1024;

/// Payloads small enough for [`SeqlockReader::read`](crate::SeqlockReader::read).
/// [`TableState`] is not one and is read with `read_boxed`.
pub trait StackPayload: BlockPayload {}

impl StackPayload for PlaybackState {}
impl StackPayload for SampleBankState {}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub sample_slot: i32,
    pub volume: f32,
    pub pitch: f32,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        sample_slot: -1,
        volume: 1.0,
        pitch: 1.0,
    };

    pub fn new(sample_slot: i32, volume: f32, pitch: f32) -> Self {
        Self {
            sample_slot,
            volume,
            pitch,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_slot < 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::EMPTY
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Section {
    pub start_step: i32,
    pub num_steps: i32,
}

impl Section {
    pub fn new(start_step: i32, num_steps: i32) -> Self {
        Self {
            start_step,
            num_steps,
        }
    }

    pub fn end_step(&self) -> i32 {
        self.start_step + self.num_steps
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PlaybackState {
    pub bpm: i32,
    pub region_start: i32,
    pub region_end: i32,
    pub song_mode: i32,
    pub current_section: i32,
    pub current_section_loop: i32,
    pub sections_loops_num: [i32; MAX_SECTIONS],
    pub is_playing: i32,
    pub current_step: i32,
}

impl PlaybackState {
    pub fn fallback() -> Self {
        let mut state: Self = unsafe { std::mem::zeroed() };
        Self::write_fallback(&mut state);
        state
    }

    pub fn song_mode(&self) -> bool {
        self.song_mode != 0
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing != 0
    }
}

unsafe impl BlockPayload for PlaybackState {
    const NAME: &'static str = "playback";

    fn block(region: &RegionLayout) -> &SeqlockBlock<Self> {
        &region.playback
    }

    fn write_fallback(out: &mut Self) {
        out.bpm = DEFAULT_BPM;
        out.region_start = 0;
        out.region_end = DEFAULT_SECTION_STEPS;
        out.song_mode = 0;
        out.current_section = 0;
        out.current_section_loop = 0;
        out.sections_loops_num = [DEFAULT_SECTION_LOOPS; MAX_SECTIONS];
        out.is_playing = 0;
        out.current_step = 0;
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct SampleSlot {
    pub loaded: i32,
    pub volume: f32,
    pub pitch: f32,
    pub sample_id: [u8; SAMPLE_MAX_ID],
    pub file_path: [u8; SAMPLE_MAX_PATH],
    pub display_name: [u8; SAMPLE_MAX_NAME],
}

impl SampleSlot {
    pub const EMPTY: SampleSlot = SampleSlot {
        loaded: 0,
        volume: 1.0,
        pitch: 1.0,
        sample_id: [0; SAMPLE_MAX_ID],
        file_path: [0; SAMPLE_MAX_PATH],
        display_name: [0; SAMPLE_MAX_NAME],
    };

    pub fn is_loaded(&self) -> bool {
        self.loaded != 0
    }

    pub fn sample_id(&self) -> Option<&str> {
        read_fixed_str(&self.sample_id)
    }

    pub fn file_path(&self) -> Option<&str> {
        read_fixed_str(&self.file_path)
    }

    pub fn display_name(&self) -> Option<&str> {
        read_fixed_str(&self.display_name)
    }

    pub fn set_strings(
        &mut self,
        sample_id: Option<&str>,
        file_path: Option<&str>,
        display_name: Option<&str>,
    ) {
        write_fixed_str(&mut self.sample_id, sample_id);
        write_fixed_str(&mut self.file_path, file_path);
        write_fixed_str(&mut self.display_name, display_name);
    }
}

impl std::fmt::Debug for SampleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSlot")
            .field("loaded", &self.is_loaded())
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("sample_id", &self.sample_id())
            .field("file_path", &self.file_path())
            .field("display_name", &self.display_name())
            .finish()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SampleBankState {
    pub max_slots: i32,
    pub samples: [SampleSlot; MAX_SAMPLE_SLOTS],
}

impl SampleBankState {
    pub fn fallback() -> Self {
        let mut state: Self = unsafe { std::mem::zeroed() };
        Self::write_fallback(&mut state);
        state
    }

    pub fn loaded_count(&self) -> usize {
        self.samples.iter().filter(|slot| slot.is_loaded()).count()
    }
}

unsafe impl BlockPayload for SampleBankState {
    const NAME: &'static str = "sample_bank";

    fn block(region: &RegionLayout) -> &SeqlockBlock<Self> {
        &region.sample_bank
    }

    fn write_fallback(out: &mut Self) {
        out.max_slots = MAX_SAMPLE_SLOTS as i32;
        out.samples = [SampleSlot::EMPTY; MAX_SAMPLE_SLOTS];
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct TableState {
    pub sections_count: i32,
    pub sections: [Section; MAX_SECTIONS],
    pub layers: [[i32; MAX_LAYERS_PER_SECTION]; MAX_SECTIONS],
    pub cells: [[Cell; MAX_SEQUENCER_COLS]; MAX_SEQUENCER_STEPS],
}

impl TableState {
    /// The table payload is several hundred KiB; keep it off the stack.
    pub fn boxed_fallback() -> Box<Self> {
        let mut state: Box<Self> = unsafe { Box::<Self>::new_zeroed().assume_init() };
        Self::write_fallback(&mut state);
        state
    }

    pub fn sections(&self) -> &[Section] {
        let count = (self.sections_count.max(0) as usize).min(MAX_SECTIONS);
        &self.sections[..count]
    }

    pub fn total_steps(&self) -> usize {
        self.sections()
            .last()
            .map(|section| section.end_step().max(0) as usize)
            .unwrap_or(0)
            .min(MAX_SEQUENCER_STEPS)
    }

    pub fn cell(&self, step: usize, column: usize) -> Option<&Cell> {
        self.cells.get(step).and_then(|row| row.get(column))
    }
}

impl std::fmt::Debug for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableState")
            .field("sections_count", &self.sections_count)
            .field("sections", &self.sections())
            .field("total_steps", &self.total_steps())
            .finish_non_exhaustive()
    }
}

unsafe impl BlockPayload for TableState {
    const NAME: &'static str = "table";

    fn block(region: &RegionLayout) -> &SeqlockBlock<Self> {
        &region.table
    }

    fn write_fallback(out: &mut Self) {
        out.sections_count = 1;
        out.sections = [Section::default(); MAX_SECTIONS];
        out.sections[0] = Section::new(0, DEFAULT_SECTION_STEPS);
        out.layers = [[MAX_COLS_PER_LAYER as i32; MAX_LAYERS_PER_SECTION]; MAX_SECTIONS];
        for row in out.cells.iter_mut() {
            *row = [Cell::EMPTY; MAX_SEQUENCER_COLS];
        }
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug)]
pub struct RegionHeader {
    pub magic: u32,
    pub layout_version: u32,
    pub region_size: u64,
    pub reserved: [u8; 48],
}

impl RegionHeader {
    pub const fn new() -> Self {
        Self {
            magic: REGION_MAGIC,
            layout_version: LAYOUT_VERSION,
            region_size: std::mem::size_of::<RegionLayout>() as u64,
            reserved: [0; 48],
        }
    }
}

/// Everything the engine shares with its clients, mapped at offset zero.
#[repr(C)]
pub struct RegionLayout {
    pub header: RegionHeader,
    pub playback: PlaybackBlock,
    pub sample_bank: SampleBankBlock,
    pub table: TableBlock,
}

const_assert_eq!(std::mem::size_of::<Cell>(), 12);
const_assert_eq!(std::mem::size_of::<Section>(), 8);
const_assert_eq!(std::mem::size_of::<SampleSlot>(), 780);
const_assert_eq!(std::mem::size_of::<PlaybackState>(), 288);
const_assert_eq!(std::mem::size_of::<SampleBankState>(), 20_284);
const_assert_eq!(std::mem::size_of::<TableState>(), 394_756);
const_assert_eq!(std::mem::size_of::<RegionHeader>(), 64);
const_assert_eq!(std::mem::size_of::<RegionLayout>(), 415_424);
const_assert!(std::mem::size_of::<PlaybackState>() <= MAX_STACK_PAYLOAD);
const_assert!(std::mem::size_of::<SampleBankState>() <= MAX_STACK_PAYLOAD);
const_assert!(std::mem::size_of::<TableState>() > MAX_STACK_PAYLOAD);

pub fn read_fixed_str(bytes: &[u8]) -> Option<&str> {
    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    if len == 0 {
        return None;
    }
    std::str::from_utf8(&bytes[..len]).ok()
}

/// Copies `value` NUL-terminated into `dst`, truncating on a char boundary.
pub fn write_fixed_str(dst: &mut [u8], value: Option<&str>) {
    dst.fill(0);
    let Some(value) = value else {
        return;
    };
    let capacity = dst.len().saturating_sub(1);
    let mut end = value.len().min(capacity);
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&value.as_bytes()[..end]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;
    use std::mem::{align_of, size_of};

    #[test]
    fn playback_layout_matches_native() {
        assert_eq!(offset_of!(PlaybackBlock, version), 0);
        assert_eq!(offset_of!(PlaybackBlock, payload), 4);
        assert_eq!(offset_of!(PlaybackState, bpm), 0);
        assert_eq!(offset_of!(PlaybackState, region_start), 4);
        assert_eq!(offset_of!(PlaybackState, region_end), 8);
        assert_eq!(offset_of!(PlaybackState, song_mode), 12);
        assert_eq!(offset_of!(PlaybackState, current_section), 16);
        assert_eq!(offset_of!(PlaybackState, current_section_loop), 20);
        assert_eq!(offset_of!(PlaybackState, sections_loops_num), 24);
        assert_eq!(offset_of!(PlaybackState, is_playing), 280);
        assert_eq!(offset_of!(PlaybackState, current_step), 284);
        assert_eq!(size_of::<PlaybackBlock>(), 292);
    }

    #[test]
    fn sample_bank_layout_matches_native() {
        assert_eq!(offset_of!(SampleBankBlock, payload), 4);
        assert_eq!(offset_of!(SampleBankState, max_slots), 0);
        assert_eq!(offset_of!(SampleBankState, samples), 4);
        assert_eq!(offset_of!(SampleSlot, loaded), 0);
        assert_eq!(offset_of!(SampleSlot, volume), 4);
        assert_eq!(offset_of!(SampleSlot, pitch), 8);
        assert_eq!(offset_of!(SampleSlot, sample_id), 12);
        assert_eq!(offset_of!(SampleSlot, file_path), 140);
        assert_eq!(offset_of!(SampleSlot, display_name), 652);
    }

    #[test]
    fn table_layout_matches_native() {
        assert_eq!(offset_of!(TableBlock, payload), 4);
        assert_eq!(offset_of!(TableState, sections_count), 0);
        assert_eq!(offset_of!(TableState, sections), 4);
        assert_eq!(offset_of!(TableState, layers), 516);
        assert_eq!(offset_of!(TableState, cells), 1540);
        assert_eq!(offset_of!(Cell, sample_slot), 0);
        assert_eq!(offset_of!(Cell, volume), 4);
        assert_eq!(offset_of!(Cell, pitch), 8);
    }

    #[test]
    fn region_layout_matches_native() {
        assert_eq!(align_of::<RegionLayout>(), 64);
        assert_eq!(offset_of!(RegionLayout, header), 0);
        assert_eq!(offset_of!(RegionLayout, playback), 64);
        assert_eq!(offset_of!(RegionLayout, sample_bank), 356);
        assert_eq!(offset_of!(RegionLayout, table), 20_644);
        assert_eq!(offset_of!(RegionHeader, region_size), 8);
    }

    #[test]
    fn playback_fallback_values() {
        let state = PlaybackState::fallback();
        assert_eq!(state.bpm, 120);
        assert_eq!(state.region_start, 0);
        assert_eq!(state.region_end, 16);
        assert!(!state.song_mode());
        assert_eq!(state.current_section, 0);
        assert!(state.sections_loops_num.iter().all(|loops| *loops == 4));
    }

    #[test]
    fn sample_bank_fallback_has_all_slots_unloaded() {
        let state = SampleBankState::fallback();
        assert_eq!(state.max_slots, 26);
        assert_eq!(state.samples.len(), 26);
        for slot in state.samples.iter() {
            assert!(!slot.is_loaded());
            assert_eq!(slot.volume, 1.0);
            assert_eq!(slot.pitch, 1.0);
            assert!(slot.sample_id().is_none());
        }
    }

    #[test]
    fn table_fallback_is_one_empty_section() {
        let table = TableState::boxed_fallback();
        assert_eq!(table.sections(), &[Section::new(0, 16)]);
        assert_eq!(table.total_steps(), 16);
        assert!(table.cells.iter().flatten().all(Cell::is_empty));
        assert_eq!(table.layers[63], [4, 4, 4, 4]);
    }

    #[test]
    fn fixed_strings_truncate_on_char_boundary() {
        let mut buf = [0u8; 5];
        write_fixed_str(&mut buf, Some("abé"));
        assert_eq!(read_fixed_str(&buf), Some("abé"));

        write_fixed_str(&mut buf, Some("abcé"));
        assert_eq!(read_fixed_str(&buf), Some("abc"));

        write_fixed_str(&mut buf, None);
        assert_eq!(read_fixed_str(&buf), None);
    }
}
