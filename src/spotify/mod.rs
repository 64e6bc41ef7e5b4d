mod client;
mod models;

pub use client::{Catalog, SpotifyClient, SpotifyCredentials, PLAYLIST_ADD_CHUNK_SIZE};
pub use models::{
    Album, AlbumRef, ArtistRef, CurrentUser, Image, Paging, Playlist, PlaylistOwner,
    PlaylistTrackEntry, SearchResults, Track,
};
