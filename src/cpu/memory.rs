//! IMAS memory subsystem.
//!
//! The machine has 4096 sixteen-bit words shared by instructions and data.
//! There is no tag distinguishing the two: a word is an instruction when the
//! program counter reaches it and data when an operand address does.

use serde::{Serialize, Deserialize};

/// The number of words in memory.
pub const MEMORY_SIZE: usize = 4096;

/// Mask reducing any 16-bit value to a valid 12-bit word address.
pub const ADDR_MASK: u16 = 0x0FFF;

/// Mask selecting the opcode nibble of an instruction word.
pub const OPCODE_MASK: u16 = 0xF000;

/// How a write modifies the target word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Store the value as the new word.
    Replace,
    /// Keep the opcode nibble of the existing word and replace only its low
    /// 12 bits with the low 12 bits of the value. Used to patch the operand
    /// address of an instruction in place without disturbing its opcode.
    PatchAddress,
}

/// IMAS memory: 4096 sixteen-bit words.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    words: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            words: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the word at an address. The address is masked to 12 bits, so
    /// every read succeeds.
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.words[(addr & ADDR_MASK) as usize]
    }

    /// Write a value to an address according to the given mode.
    ///
    /// Returns the word actually stored, which for `PatchAddress` differs
    /// from the raw value: the opcode nibble of the previous word survives.
    /// The engine latches this return value into MBR.
    pub fn write(&mut self, addr: u16, value: i16, mode: WriteMode) -> u16 {
        let index = (addr & ADDR_MASK) as usize;
        let stored = match mode {
            WriteMode::Replace => value as u16,
            WriteMode::PatchAddress => {
                let opcode = self.words[index] & OPCODE_MASK;
                opcode | (value as u16 & ADDR_MASK)
            }
        };
        self.words[index] = stored;
        stored
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
    }

    /// Fill memory from a parsed image.
    pub fn load_image(&mut self, image: &crate::image::MemoryImage) {
        for &(addr, word) in &image.cells {
            self.words[(addr & ADDR_MASK) as usize] = word;
        }
    }

    /// Dump a region of memory (for diagnostics).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        let start = (start & ADDR_MASK) as usize;
        let end = (start + count).min(MEMORY_SIZE);
        (start..end).map(|i| (i as u16, self.words[i])).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero words
        let non_zero = self.words.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_starts_zeroed() {
        let mem = Memory::new();
        assert_eq!(mem.read(0), 0);
        assert_eq!(mem.read(0x0FFF), 0);
    }

    #[test]
    fn test_read_write_replace() {
        let mut mem = Memory::new();
        let stored = mem.write(10, 0x1234u16 as i16, WriteMode::Replace);
        assert_eq!(stored, 0x1234);
        assert_eq!(mem.read(10), 0x1234);
    }

    #[test]
    fn test_negative_value_stored_as_raw_word() {
        let mut mem = Memory::new();
        mem.write(5, -1, WriteMode::Replace);
        assert_eq!(mem.read(5), 0xFFFF);
    }

    #[test]
    fn test_address_masked_to_12_bits() {
        let mut mem = Memory::new();
        mem.write(0x1005, 42, WriteMode::Replace);
        // 0x1005 aliases 0x005
        assert_eq!(mem.read(0x0005), 42);
        assert_eq!(mem.read(0xF005), 42);
    }

    #[test]
    fn test_patch_address_preserves_opcode() {
        let mut mem = Memory::new();
        mem.write(20, 0x6005u16 as i16, WriteMode::Replace);

        let stored = mem.write(20, 0x0ABC, WriteMode::PatchAddress);

        assert_eq!(stored, 0x6ABC);
        assert_eq!(mem.read(20), 0x6ABC);
    }

    #[test]
    fn test_patch_address_ignores_value_opcode_bits() {
        let mut mem = Memory::new();
        mem.write(20, 0xA123u16 as i16, WriteMode::Replace);

        // Only the low 12 bits of the value take part
        mem.write(20, 0x7FFFu16 as i16, WriteMode::PatchAddress);

        assert_eq!(mem.read(20), 0xAFFF);
    }

    #[test]
    fn test_clear() {
        let mut mem = Memory::new();
        mem.write(100, 7, WriteMode::Replace);
        mem.clear();
        assert_eq!(mem.read(100), 0);
    }

    #[test]
    fn test_dump() {
        let mut mem = Memory::new();
        mem.write(8, 1, WriteMode::Replace);
        mem.write(9, 2, WriteMode::Replace);

        let region = mem.dump(8, 2);

        assert_eq!(region, vec![(8, 1), (9, 2)]);
    }
}
