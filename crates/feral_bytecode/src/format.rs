//! The compiled-bytecode on-disk format (`spec.md` §6), little-endian,
//! hand-written binary I/O — matching `original_source`'s `VM/Bytecode.cpp`,
//! which hand-writes the same kind of tagged-record stream rather than
//! reaching for a serde-derived container format.

use std::io::{self, Read, Write};

use feral_base::{Interner, Location, SourceId};

use crate::instruction::{Data, DataTag, Instruction};
use crate::opcode::Opcode;

const MAGIC: [u8; 4] = *b"FRAL";
const VERSION: u16 = 1;

/// One compiled module's bytecode plus which source it came from.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub source: SourceId,
    pub code: Vec<Instruction>,
}

/// A whole compiled program: every source touched, and every module's
/// bytecode, in the layout `spec.md` §6 specifies byte-for-byte.
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    /// `(source id, canonical path)` pairs, in source-table order.
    pub sources: Vec<(SourceId, String)>,
    pub modules: Vec<CompiledModule>,
}

impl CompiledProgram {
    pub fn write(&self, w: &mut impl Write, interner: &Interner) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;

        w.write_all(&(self.sources.len() as u32).to_le_bytes())?;
        for (id, path) in &self.sources {
            w.write_all(&(id.raw() as u64).to_le_bytes())?;
            write_bytes(w, path.as_bytes())?;
        }

        w.write_all(&(self.modules.len() as u32).to_le_bytes())?;
        for module in &self.modules {
            w.write_all(&(module.source.raw() as u64).to_le_bytes())?;
            w.write_all(&(module.code.len() as u32).to_le_bytes())?;
            for ins in &module.code {
                write_instruction(w, ins, interner)?;
            }
        }
        Ok(())
    }

    pub fn read(r: &mut impl Read, interner: &mut Interner) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic in compiled module"));
        }
        let version = read_u16(r)?;
        if version != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported compiled-bytecode version {version}"),
            ));
        }

        let source_count = read_u32(r)?;
        let mut sources = Vec::with_capacity(source_count as usize);
        for _ in 0..source_count {
            let id = SourceId::from_raw(read_u64(r)? as u32);
            let path = read_string(r)?;
            sources.push((id, path));
        }

        let module_count = read_u32(r)?;
        let mut modules = Vec::with_capacity(module_count as usize);
        for _ in 0..module_count {
            let source = SourceId::from_raw(read_u64(r)? as u32);
            let ins_count = read_u32(r)?;
            let mut code = Vec::with_capacity(ins_count as usize);
            for _ in 0..ins_count {
                code.push(read_instruction(r, interner)?);
            }
            modules.push(CompiledModule { source, code });
        }

        Ok(CompiledProgram { sources, modules })
    }
}

fn write_instruction(w: &mut impl Write, ins: &Instruction, interner: &Interner) -> io::Result<()> {
    w.write_all(&[ins.op.as_u8()])?;
    w.write_all(&(ins.loc.source.raw() as u64).to_le_bytes())?;
    w.write_all(&(ins.loc.start as u32).to_le_bytes())?;
    w.write_all(&(ins.loc.end as u32).to_le_bytes())?;
    match &ins.data {
        Data::Nil => w.write_all(&[DataTag::Nil as u8])?,
        Data::Int(v) => {
            w.write_all(&[DataTag::Int as u8])?;
            w.write_all(&v.to_le_bytes())?;
        }
        Data::Flt(v) => {
            w.write_all(&[DataTag::Flt as u8])?;
            w.write_all(&v.to_le_bytes())?;
        }
        Data::Bool(v) => {
            w.write_all(&[DataTag::Bool as u8])?;
            w.write_all(&[*v as u8])?;
        }
        Data::Str(s) => {
            w.write_all(&[DataTag::Str as u8])?;
            write_bytes(w, s.as_bytes())?;
        }
        Data::Iden(sym) => {
            w.write_all(&[DataTag::Iden as u8])?;
            write_bytes(w, interner.resolve(*sym).as_bytes())?;
        }
    }
    Ok(())
}

fn read_instruction(r: &mut impl Read, interner: &mut Interner) -> io::Result<Instruction> {
    let op = Opcode::from_u8(read_u8(r)?)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown opcode byte"))?;
    let source = SourceId::from_raw(read_u64(r)? as u32);
    let start = read_u32(r)? as usize;
    let end = read_u32(r)? as usize;
    let loc = Location::new(source, start, end);
    let tag = DataTag::from_u8(read_u8(r)?)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown data tag byte"))?;
    let data = match tag {
        DataTag::Nil => Data::Nil,
        DataTag::Int => Data::Int(read_i64(r)?),
        DataTag::Flt => Data::Flt(read_f64(r)?),
        DataTag::Bool => Data::Bool(read_u8(r)? != 0),
        DataTag::Str => Data::Str(read_string(r)?),
        DataTag::Iden => Data::Iden(interner.intern(&read_string(r)?)),
    };
    Ok(Instruction::new(op, loc, data))
}

fn write_bytes(w: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_string(r: &mut impl Read) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64(r: &mut impl Read) -> io::Result<i64> {
    Ok(read_u64(r)? as i64)
}

fn read_f64(r: &mut impl Read) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: SourceId, s: usize, e: usize) -> Location {
        Location::new(id, s, e)
    }

    #[test]
    fn round_trip_preserves_every_instruction() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let source = SourceId::from_raw(0);

        let code = vec![
            Instruction::new(Opcode::LoadData, loc(source, 0, 1), Data::Int(42)),
            Instruction::new(Opcode::LoadData, loc(source, 2, 3), Data::Flt(1.5)),
            Instruction::new(Opcode::LoadData, loc(source, 4, 5), Data::Str("hi".into())),
            Instruction::new(Opcode::Create, loc(source, 6, 7), Data::Iden(name)),
            Instruction::new(Opcode::Return, loc(source, 8, 9), Data::Bool(true)),
            Instruction::new(Opcode::PopTry, loc(source, 10, 10), Data::Nil),
        ];
        let program = CompiledProgram {
            sources: vec![(source, "test.feral".to_string())],
            modules: vec![CompiledModule { source, code }],
        };

        let mut buf = Vec::new();
        program.write(&mut buf, &interner).unwrap();

        let mut reader_interner = Interner::new();
        let read_back = CompiledProgram::read(&mut &buf[..], &mut reader_interner).unwrap();

        assert_eq!(read_back.sources.len(), 1);
        assert_eq!(read_back.sources[0].1, "test.feral");
        assert_eq!(read_back.modules.len(), 1);
        let ins = &read_back.modules[0].code;
        assert_eq!(ins.len(), 6);
        assert_eq!(ins[0].data, Data::Int(42));
        assert_eq!(ins[1].data, Data::Flt(1.5));
        assert_eq!(ins[2].data, Data::Str("hi".into()));
        assert_eq!(ins[4].data, Data::Bool(true));
        assert_eq!(ins[5].data, Data::Nil);
        assert_eq!(reader_interner.resolve(ins[3].data.as_iden()), "x");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut interner = Interner::new();
        let bad = [0u8, 1, 2, 3, 4, 5];
        assert!(CompiledProgram::read(&mut &bad[..], &mut interner).is_err());
    }
}
