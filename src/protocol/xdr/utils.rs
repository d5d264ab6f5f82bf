use std::io::{Read, Write};

/// Every XDR item occupies a multiple of four bytes on the wire.
pub const ALIGNMENT: usize = 4;

fn pad_for(len: usize) -> usize {
    (ALIGNMENT - (len % ALIGNMENT)) % ALIGNMENT
}

pub fn read_padding(len: usize, src: &mut impl Read) -> std::io::Result<()> {
    let pad = pad_for(len);
    if pad > 0 {
        let mut scratch: [u8; ALIGNMENT] = Default::default();
        src.read_exact(&mut scratch[..pad])?;
    }
    Ok(())
}

pub fn write_padding(len: usize, dest: &mut impl Write) -> std::io::Result<()> {
    let pad = pad_for(len);
    if pad > 0 {
        let zeros: [u8; ALIGNMENT] = Default::default();
        dest.write_all(&zeros[..pad])?;
    }
    Ok(())
}

pub fn invalid_data(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}
