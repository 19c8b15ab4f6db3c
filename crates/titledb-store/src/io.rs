//! Little-endian primitives shared by the pack readers and writers.

use std::io::{Read, Write};

use crate::error::Result;

pub fn write_u32(w: &mut dyn Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_i32(w: &mut dyn Write, v: i32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u64(w: &mut dyn Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_exact<const N: usize>(r: &mut dyn Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32(r: &mut dyn Read) -> Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_i32(r: &mut dyn Read) -> Result<i32> {
    Ok(i32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_u64(r: &mut dyn Read) -> Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8>(r)?))
}
