//! Compiled-in asset manifest and cache version bookkeeping.

/// Version tag for the deployed asset set.
///
/// Bumping this is the only supported way to force eviction of everything
/// cached by previous versions: namespaces carry the tag in their name, and
/// activation deletes every namespace whose name does not contain it.
pub const CACHE_VERSION: &str = "v4";

/// Document served as the last-resort fallback for offline navigations.
pub const SHELL_DOCUMENT: &str = "/index.html";

/// How many numbered narration clips the app ships (numbers 1 through 30).
pub const NUMBER_SOUND_COUNT: u32 = 30;

/// Fixed assets seeded at install, ahead of the generated number sounds.
const STATIC_FILES: &[&str] = &[
  "/",
  "/index.html",
  "/manifest.json",
  "/icon.svg",
  "/sounds/effects/correct.mp3",
  "/sounds/effects/incorrect.mp3",
  "/sounds/effects/complete.mp3",
];

/// Name of the namespace seeded once at install for the given version.
pub fn static_namespace(version: &str) -> String {
  format!("static-{}", version)
}

/// Name of the namespace populated opportunistically at runtime.
pub fn dynamic_namespace(version: &str) -> String {
  format!("dynamic-{}", version)
}

/// Paths of the numbered narration clips, `/sounds/numbers/1.mp3` onward.
pub fn number_sounds() -> Vec<String> {
  (1..=NUMBER_SOUND_COUNT)
    .map(|n| format!("/sounds/numbers/{}.mp3", n))
    .collect()
}

/// The complete install manifest: fixed files plus the number sounds.
pub fn cache_manifest() -> Vec<String> {
  let mut paths: Vec<String> = STATIC_FILES.iter().map(|p| p.to_string()).collect();
  paths.extend(number_sounds());
  paths
}
