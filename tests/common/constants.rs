//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user credentials, catalog IDs, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// Second test user handle, for ownership tests
pub const OTHER_USER: &str = "otheruser";

/// Second test user password
pub const OTHER_PASS: &str = "otherpass123";

// ============================================================================
// Mock Catalog IDs
// ============================================================================

/// Track ID for "Opening Track"
pub const TRACK_1_ID: &str = "track-1";

/// Track ID for "Closing Track"
pub const TRACK_2_ID: &str = "track-2";

/// Album ID for "First Album"
pub const ALBUM_1_ID: &str = "album-1";

/// Playlist ID returned by the mock catalog's create_playlist
pub const CREATED_PLAYLIST_ID: &str = "playlist-new";

// ============================================================================
// Mock Catalog Metadata
// ============================================================================

/// Track 1 name
pub const TRACK_1_NAME: &str = "Opening Track";

/// Track 2 name
pub const TRACK_2_NAME: &str = "Closing Track";

/// Album 1 name
pub const ALBUM_1_NAME: &str = "First Album";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
