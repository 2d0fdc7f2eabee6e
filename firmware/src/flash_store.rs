//! Settings persisted in on-board flash.
//!
//! Each settings word is its own `sequential-storage` map item, keyed by
//! [`SettingKey::raw`] and holding the word little-endian. The map appends
//! new values and erases a page only after its live items have been moved,
//! so a reset in the middle of a write leaves the previous value readable.
//!
//! A [`SettingsCache`] serves every read. Writes only touch the cache; the
//! main loop calls [`FlashStore::flush`] to persist what changed.

use defmt::{debug, error, info, Debug2Format};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use reex::{ConfigStore, LayoutOptions, SettingKey, SettingsCache, StorageError};
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Pico on-board flash.
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Sectors handed to the settings map, at the end of flash.
pub const STORE_SECTORS: usize = 4;

/// Offset of the first settings sector from the start of flash.
pub const STORE_START: u32 = (FLASH_SIZE - STORE_SECTORS * ERASE_SIZE) as u32;

/// End (exclusive) of the settings area.
pub const STORE_END: u32 = FLASH_SIZE as u32;

/// Lighting words kept per layer.
pub const LAYER_SLOTS: usize = 8;

/// Scratch space for one key plus one word, with room for item headers.
const ITEM_BUF_SIZE: usize = 32;

/// The on-board flash in blocking mode.
pub type ReexFlash<'d> = Flash<'d, FLASH, Blocking, FLASH_SIZE>;

/// Settings words cached in RAM and persisted as flash map items.
pub struct FlashStore<'d> {
    flash: BlockingAsync<ReexFlash<'d>>,
    cache: SettingsCache<LAYER_SLOTS>,
}

impl<'d> FlashStore<'d> {
    /// Create a new store over the flash peripheral. The cache starts
    /// empty; call [`Self::load`] before handing the store out.
    #[must_use]
    pub fn new(flash: ReexFlash<'d>) -> Self {
        Self {
            flash: BlockingAsync::new(flash),
            cache: SettingsCache::new(),
        }
    }

    /// Fill the cache from flash. Missing or unreadable items keep their
    /// defaults.
    pub async fn load(&mut self) {
        let mut buf = [0u8; ITEM_BUF_SIZE];
        let mut found = 0usize;
        for key in SettingsCache::<LAYER_SLOTS>::keys() {
            match fetch_item::<u8, &[u8], _>(
                &mut self.flash,
                STORE_START..STORE_END,
                &mut NoCache::new(),
                &mut buf,
                &key.raw(),
            )
            .await
            {
                Ok(Some(data)) => match <[u8; 4]>::try_from(data) {
                    Ok(bytes) => {
                        let _ = self.cache.restore(key, u32::from_le_bytes(bytes));
                        found += 1;
                    }
                    Err(_) => error!("settings item {:?} has {} bytes", key, data.len()),
                },
                Ok(None) => {}
                Err(e) => error!("settings read failed for {:?}: {:?}", key, Debug2Format(&e)),
            }
        }
        info!("loaded {} settings words from flash", found);
    }

    /// `true` while some word has not reached flash.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.cache.is_dirty()
    }

    /// Write every changed word to flash. Stops at the first failure and
    /// leaves the remaining words dirty for the next call.
    pub async fn flush(&mut self) -> Result<(), StorageError> {
        let mut buf = [0u8; ITEM_BUF_SIZE];
        while let Some((key, raw)) = self.cache.next_dirty() {
            let bytes = raw.to_le_bytes();
            let item: &[u8] = &bytes;
            store_item::<u8, &[u8], _>(
                &mut self.flash,
                STORE_START..STORE_END,
                &mut NoCache::new(),
                &mut buf,
                &key.raw(),
                &item,
            )
            .await
            .map_err(|e| {
                error!("settings write failed for {:?}: {:?}", key, Debug2Format(&e));
                StorageError::Io
            })?;
            self.cache.mark_clean(key);
            debug!("settings word {:?} saved", key);
        }
        Ok(())
    }
}

impl ConfigStore for FlashStore<'_> {
    fn read_kb(&mut self) -> Option<u32> {
        self.cache.read_kb()
    }

    fn write_kb(&mut self, raw: u32) -> Result<(), StorageError> {
        self.cache.write_kb(raw)
    }

    fn read_layer_word(&mut self, layer: u8) -> Option<u32> {
        self.cache.read_layer_word(layer)
    }

    fn write_layer_word(&mut self, layer: u8, raw: u32) -> Result<(), StorageError> {
        self.cache.write_layer_word(layer, raw)
    }
}

impl LayoutOptions for FlashStore<'_> {
    fn layout_options(&self) -> u32 {
        self.cache.layout_options()
    }

    fn set_layout_options(&mut self, value: u32) {
        self.cache.set_layout_options(value);
    }
}
