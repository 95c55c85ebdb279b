//! Line-oriented command language over an [Engine].
//!
//! ```text
//! in [path]     initialize, or restore from an image
//! cr name       create a file
//! de name       destroy a file
//! op name       open a file
//! cl h          close a handle
//! rd h n        read n bytes
//! wr h c n      write n copies of c
//! sk h pos      seek
//! dr            list the directory
//! sv path       save an image
//! ```

use std::{fmt, path::PathBuf};

use crate::{
    engine::{Engine, InitKind},
    fs::{self, oft::Handle},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init(Option<PathBuf>),
    Create(String),
    Destroy(String),
    Open(String),
    Close(Handle),
    Read(Handle, usize),
    Write(Handle, u8, usize),
    Seek(Handle, u32),
    List,
    Save(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unknown(String),
    Usage(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(op) => write!(f, "invalid operation '{op}'"),
            Self::Usage(usage) => write!(f, "usage: {usage}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<&ParseError> for libc::c_int {
    fn from(_: &ParseError) -> Self {
        libc::EINVAL
    }
}

fn handle(arg: &str) -> Option<Handle> {
    arg.parse().ok().map(Handle::new)
}

fn byte(arg: &str) -> Option<u8> {
    match arg.as_bytes() {
        [b] => Some(*b),
        _ => None,
    }
}

impl Command {
    /// Parses one line. Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut tokens = line.split_whitespace();
        let Some(op) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();

        let command = match op.to_ascii_lowercase().as_str() {
            "in" => match args[..] {
                [] => Some(Self::Init(None)),
                [path] => Some(Self::Init(Some(path.into()))),
                _ => None,
            }
            .ok_or(ParseError::Usage("in [path]"))?,
            "cr" => match args[..] {
                [name] => Some(Self::Create(name.to_string())),
                _ => None,
            }
            .ok_or(ParseError::Usage("cr name"))?,
            "de" => match args[..] {
                [name] => Some(Self::Destroy(name.to_string())),
                _ => None,
            }
            .ok_or(ParseError::Usage("de name"))?,
            "op" => match args[..] {
                [name] => Some(Self::Open(name.to_string())),
                _ => None,
            }
            .ok_or(ParseError::Usage("op name"))?,
            "cl" => match args[..] {
                [h] => handle(h).map(Self::Close),
                _ => None,
            }
            .ok_or(ParseError::Usage("cl handle"))?,
            "rd" => match args[..] {
                [h, n] => handle(h).zip(n.parse().ok()).map(|(h, n)| Self::Read(h, n)),
                _ => None,
            }
            .ok_or(ParseError::Usage("rd handle count"))?,
            "wr" => match args[..] {
                [h, c, n] => match (handle(h), byte(c), n.parse().ok()) {
                    (Some(h), Some(c), Some(n)) => Some(Self::Write(h, c, n)),
                    _ => None,
                },
                _ => None,
            }
            .ok_or(ParseError::Usage("wr handle char count"))?,
            "sk" => match args[..] {
                [h, pos] => handle(h)
                    .zip(pos.parse().ok())
                    .map(|(h, pos)| Self::Seek(h, pos)),
                _ => None,
            }
            .ok_or(ParseError::Usage("sk handle pos"))?,
            "dr" => match args[..] {
                [] => Some(Self::List),
                _ => None,
            }
            .ok_or(ParseError::Usage("dr"))?,
            "sv" => match args[..] {
                [path] => Some(Self::Save(path.into())),
                _ => None,
            }
            .ok_or(ParseError::Usage("sv path"))?,
            _ => return Err(ParseError::Unknown(op.to_string())),
        };
        Ok(Some(command))
    }

    /// Runs the command, returning the line to print.
    pub fn execute(&self, engine: &mut Engine) -> fs::Result<String> {
        match self {
            Self::Init(path) => match engine.init(path.as_deref())? {
                InitKind::Formatted => Ok("disk initialized".to_string()),
                InitKind::Restored => Ok("disk restored".to_string()),
            },
            Self::Create(name) => {
                engine.create(name)?;
                Ok(format!("{name} created"))
            }
            Self::Destroy(name) => {
                engine.destroy(name)?;
                Ok(format!("{name} destroyed"))
            }
            Self::Open(name) => {
                let handle = engine.open(name)?;
                Ok(format!("{name} opened {handle}"))
            }
            Self::Close(handle) => {
                engine.close(*handle)?;
                Ok(format!("{handle} closed"))
            }
            Self::Read(handle, count) => {
                let data = engine.read(*handle, *count)?;
                Ok(String::from_utf8_lossy(&data).into_owned())
            }
            Self::Write(handle, byte, count) => {
                let written = engine.write(*handle, *byte, *count)?;
                Ok(format!("{written} bytes written"))
            }
            Self::Seek(handle, pos) => {
                engine.seek(*handle, *pos)?;
                Ok(format!("position is {pos}"))
            }
            Self::List => {
                let names: Vec<_> = engine.list()?.into_iter().map(|info| info.name).collect();
                Ok(names.join(" "))
            }
            Self::Save(path) => {
                engine.save(path)?;
                Ok("disk saved".to_string())
            }
        }
    }
}
