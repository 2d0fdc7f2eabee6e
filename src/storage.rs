/// Error type for non-volatile storage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Underlying flash/EEPROM operation failed.
    Io,
    /// Address outside the reserved area (e.g. layer past `layer_count`).
    OutOfRange,
}

/// Word-addressed persistent storage for settings.
pub trait ConfigStore {
    /// The keyboard settings word, or `None` when storage is uninitialised.
    fn read_kb(&mut self) -> Option<u32>;

    fn write_kb(&mut self, raw: u32) -> Result<(), StorageError>;

    /// Saved lighting word for `layer`, if any.
    fn read_layer_word(&mut self, layer: u8) -> Option<u32>;

    fn write_layer_word(&mut self, layer: u8, raw: u32) -> Result<(), StorageError>;
}

/// The host's VIA layout-options word. The low two bits say which halves
/// carry a trackball.
pub trait LayoutOptions {
    fn layout_options(&self) -> u32;
    fn set_layout_options(&mut self, value: u32);
}

/// One persisted settings word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingKey {
    /// Keyboard settings word ([`crate::ConfigRecord`]).
    Kb,
    /// VIA layout options.
    Layout,
    /// Lighting word saved for a layer.
    Layer(u8),
}

impl SettingKey {
    const LAYER_BASE: u8 = 0x10;

    /// Key used for the item in a key-value flash map.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Kb => 0x00,
            Self::Layout => 0x01,
            Self::Layer(layer) => Self::LAYER_BASE.wrapping_add(layer),
        }
    }

    /// Bit in the dirty mask. Layers follow the two header words.
    const fn slot(self) -> u32 {
        match self {
            Self::Kb => 0,
            Self::Layout => 1,
            Self::Layer(layer) => 2 + layer as u32,
        }
    }

    const fn from_slot(slot: u32) -> Self {
        match slot {
            0 => Self::Kb,
            1 => Self::Layout,
            n => Self::Layer((n - 2) as u8),
        }
    }
}

/// RAM copy of the persisted settings words.
///
/// Every [`ConfigStore`] and [`LayoutOptions`] call is served from RAM.
/// Writes that change a word mark it dirty; the storage backend walks the
/// dirty words with [`Self::next_dirty`], persists each one as its own item
/// and acknowledges it with [`Self::mark_clean`]. Words are stored
/// independently, so a failed write never touches the others.
///
/// `LAYERS` is at most 30.
#[derive(Debug, Clone)]
pub struct SettingsCache<const LAYERS: usize> {
    kb: Option<u32>,
    layout: u32,
    layers: [Option<u32>; LAYERS],
    dirty: u32,
}

impl<const LAYERS: usize> Default for SettingsCache<LAYERS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LAYERS: usize> SettingsCache<LAYERS> {
    const CHECK_LAYERS: () = assert!(LAYERS <= 30, "dirty mask holds 30 layers");

    /// Create an empty cache: no kb word, layout options 0, no layer words.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::CHECK_LAYERS;
        Self {
            kb: None,
            layout: 0,
            layers: [None; LAYERS],
            dirty: 0,
        }
    }

    /// Every key this cache holds, in load order.
    pub fn keys() -> impl Iterator<Item = SettingKey> {
        [SettingKey::Kb, SettingKey::Layout]
            .into_iter()
            .chain((0..LAYERS as u8).map(SettingKey::Layer))
    }

    /// Current value for `key`, `None` when never written.
    #[must_use]
    pub fn get(&self, key: SettingKey) -> Option<u32> {
        match key {
            SettingKey::Kb => self.kb,
            SettingKey::Layout => Some(self.layout),
            SettingKey::Layer(layer) => self.layers.get(usize::from(layer)).copied().flatten(),
        }
    }

    /// Fill in a word read back from storage. Does not mark it dirty.
    pub fn restore(&mut self, key: SettingKey, raw: u32) -> Result<(), StorageError> {
        self.put(key, raw)
    }

    /// `true` while some word differs from what storage holds.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// The lowest dirty word and its value.
    #[must_use]
    pub fn next_dirty(&self) -> Option<(SettingKey, u32)> {
        if self.dirty == 0 {
            return None;
        }
        let key = SettingKey::from_slot(self.dirty.trailing_zeros());
        self.get(key).map(|raw| (key, raw))
    }

    /// The word for `key` has reached storage.
    pub fn mark_clean(&mut self, key: SettingKey) {
        self.dirty &= !(1 << key.slot());
    }

    fn put(&mut self, key: SettingKey, raw: u32) -> Result<(), StorageError> {
        match key {
            SettingKey::Kb => self.kb = Some(raw),
            SettingKey::Layout => self.layout = raw,
            SettingKey::Layer(layer) => {
                *self
                    .layers
                    .get_mut(usize::from(layer))
                    .ok_or(StorageError::OutOfRange)? = Some(raw);
            }
        }
        Ok(())
    }

    fn update(&mut self, key: SettingKey, raw: u32) -> Result<(), StorageError> {
        if self.get(key) == Some(raw) {
            return Ok(());
        }
        self.put(key, raw)?;
        self.dirty |= 1 << key.slot();
        Ok(())
    }
}

impl<const LAYERS: usize> ConfigStore for SettingsCache<LAYERS> {
    fn read_kb(&mut self) -> Option<u32> {
        self.kb
    }

    fn write_kb(&mut self, raw: u32) -> Result<(), StorageError> {
        self.update(SettingKey::Kb, raw)
    }

    fn read_layer_word(&mut self, layer: u8) -> Option<u32> {
        self.get(SettingKey::Layer(layer))
    }

    fn write_layer_word(&mut self, layer: u8, raw: u32) -> Result<(), StorageError> {
        self.update(SettingKey::Layer(layer), raw)
    }
}

impl<const LAYERS: usize> LayoutOptions for SettingsCache<LAYERS> {
    fn layout_options(&self) -> u32 {
        self.layout
    }

    fn set_layout_options(&mut self, value: u32) {
        // Infallible: the layout word always has a slot.
        let _ = self.update(SettingKey::Layout, value);
    }
}
