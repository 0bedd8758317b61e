#![forbid(unsafe_code)]

mod error;
mod fetch;
mod parsing;

pub use crate::{
    error::{HlsResult, ManifestError},
    fetch::ManifestFetcher,
    parsing::{
        parse_master_playlist, parse_media_playlist, parse_root_playlist, ByteRange,
        MasterPlaylist, MediaPlaylist, MediaSegment, RootPlaylist, VariantId, VariantStream,
    },
};
