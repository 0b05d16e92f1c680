//! Base45 decoding per draft-faltstrom-base45.
//!
//! Three characters encode two bytes (a base-45 little-endian value up to
//! 0xFFFF), a trailing group of two characters encodes one byte, and a
//! trailing group of one character is not decodable.

use thiserror::Error;

const ALPHABET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("character {0:?} is not in the base45 alphabet")]
    InvalidCharacter(char),
    #[error("a trailing group of one character is not decodable")]
    InvalidLength,
    #[error("encoded group value is out of range")]
    ValueOutOfRange,
}

fn value_of(c: u8) -> Result<u32, Error> {
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|p| p as u32)
        .ok_or(Error::InvalidCharacter(c as char))
}

pub fn decode(input: &str) -> Result<Vec<u8>, Error> {
    let bytes = input.as_bytes();
    if bytes.len() % 3 == 1 {
        return Err(Error::InvalidLength);
    }
    let mut out = Vec::with_capacity(bytes.len() / 3 * 2 + 1);
    for chunk in bytes.chunks(3) {
        match *chunk {
            [a, b, c] => {
                let v = value_of(a)? + value_of(b)? * 45 + value_of(c)? * 45 * 45;
                if v > 0xFFFF {
                    return Err(Error::ValueOutOfRange);
                }
                out.push((v >> 8) as u8);
                out.push((v & 0xFF) as u8);
            }
            [a, b] => {
                let v = value_of(a)? + value_of(b)? * 45;
                if v > 0xFF {
                    return Err(Error::ValueOutOfRange);
                }
                out.push(v as u8);
            }
            _ => return Err(Error::InvalidLength),
        }
    }
    Ok(out)
}

/// Inverse of [decode]; used to build encoded fixtures in tests.
#[cfg(test)]
pub(crate) fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len() / 2 * 3 + 2);
    for chunk in input.chunks(2) {
        match *chunk {
            [a, b] => {
                let v = u32::from(a) << 8 | u32::from(b);
                out.push(ALPHABET[(v % 45) as usize] as char);
                out.push(ALPHABET[(v / 45 % 45) as usize] as char);
                out.push(ALPHABET[(v / (45 * 45)) as usize] as char);
            }
            [a] => {
                let v = u32::from(a);
                out.push(ALPHABET[(v % 45) as usize] as char);
                out.push(ALPHABET[(v / 45) as usize] as char);
            }
            _ => unreachable!(),
        }
    }
    out
}
