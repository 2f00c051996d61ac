//! Disassembler (C3 testing aid, §8 invariant 5): renders a [`Chunk`] back
//! to one line of text per instruction, for golden-file tests and the CLI's
//! `dres disasm` subcommand.

use crate::chunk::{Chunk, ChunkError};

/// Disassemble every instruction in `chunk`, one line per instruction,
/// prefixed with its word offset.
pub fn disassemble(chunk: &Chunk) -> Result<String, ChunkError> {
    let mut pc = 0;
    let mut out = String::new();
    while pc < chunk.len() {
        let (instr, consumed) = chunk.decode_at(pc)?;
        out.push_str(&format!("{pc:>5}  {instr}\n"));
        pc += consumed;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::RelOp;

    #[test]
    fn offsets_advance_by_each_instructions_word_count() {
        let mut c = Chunk::new();
        c.push_int(100_000); // 2 words
        c.cmp(RelOp::Eq); // 1 word
        c.halt(); // 1 word
        let text = disassemble(&c).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("0"));
        assert!(lines[1].trim_start().starts_with("2"));
        assert!(lines[2].trim_start().starts_with("3"));
    }
}
