//! VIA custom lighting commands with per-layer saved lighting.
//!
//! Raw HID packet layout: `data[0]` command, `data[1]` value id, value bytes
//! from `data[2]`. `get` commands answer in place.

use crate::storage::{ConfigStore, StorageError};

pub const ID_LIGHTING_SET_VALUE: u8 = 0x07;
pub const ID_LIGHTING_GET_VALUE: u8 = 0x08;
pub const ID_LIGHTING_SAVE: u8 = 0x09;

pub const ID_BRIGHTNESS: u8 = 0x80;
pub const ID_EFFECT: u8 = 0x81;
pub const ID_EFFECT_SPEED: u8 = 0x82;
pub const ID_COLOR: u8 = 0x83;

/// Backlight/underglow driver. Setters must not persist anything.
pub trait Lighting {
    fn val(&self) -> u8;
    fn mode(&self) -> u8;
    fn speed(&self) -> u8;
    fn hue(&self) -> u8;
    fn sat(&self) -> u8;

    fn set_hsv(&mut self, hue: u8, sat: u8, val: u8);
    fn set_mode(&mut self, mode: u8);
    fn set_enabled(&mut self, enabled: bool);
    fn set_speed(&mut self, speed: u8);

    /// Current settings as the driver's packed config word.
    fn config_word(&self) -> u32;
    /// Replace the current settings with a packed config word.
    fn apply_config_word(&mut self, raw: u32);
    /// Persist the current settings as the power-on default.
    fn persist(&mut self);
}

/// Index of the highest active layer in a layer bitmap.
#[must_use]
pub const fn highest_layer(layer_state: u32) -> u8 {
    if layer_state == 0 {
        0
    } else {
        (31 - layer_state.leading_zeros()) as u8
    }
}

pub struct ViaLighting<L> {
    lighting: L,
    layer_count: u8,
}

impl<L: Lighting> ViaLighting<L> {
    /// Create a new handler. `layer_count` bounds the per-layer save slots.
    #[must_use]
    pub const fn new(lighting: L, layer_count: u8) -> Self {
        Self {
            lighting,
            layer_count,
        }
    }

    /// Get a reference to the lighting backend.
    pub fn lighting(&self) -> &L {
        &self.lighting
    }

    /// Get a mutable reference to the lighting backend.
    pub fn lighting_mut(&mut self) -> &mut L {
        &mut self.lighting
    }

    /// Handle one raw HID packet. Unknown commands and value ids are ignored.
    pub fn receive<S: ConfigStore>(
        &mut self,
        data: &mut [u8],
        layer_state: u32,
        store: &mut S,
    ) -> Result<(), StorageError> {
        let Some((&mut command, rest)) = data.split_first_mut() else {
            return Ok(());
        };
        match command {
            ID_LIGHTING_SET_VALUE => self.set_value(rest),
            ID_LIGHTING_GET_VALUE => self.get_value(rest),
            ID_LIGHTING_SAVE => self.save(highest_layer(layer_state), store)?,
            _ => {}
        }
        Ok(())
    }

    fn set_value(&mut self, data: &[u8]) {
        let l = &mut self.lighting;
        match *data {
            [ID_BRIGHTNESS, val, ..] => {
                let (hue, sat) = (l.hue(), l.sat());
                l.set_hsv(hue, sat, val);
            }
            [ID_EFFECT, mode, ..] => {
                l.set_mode(mode);
                l.set_enabled(mode != 0);
            }
            [ID_EFFECT_SPEED, speed, ..] => l.set_speed(speed),
            [ID_COLOR, hue, sat, ..] => {
                let val = l.val();
                l.set_hsv(hue, sat, val);
            }
            _ => {}
        }
    }

    fn get_value(&self, data: &mut [u8]) {
        let l = &self.lighting;
        match data {
            [ID_BRIGHTNESS, out, ..] => *out = l.val(),
            [ID_EFFECT, out, ..] => *out = l.mode(),
            [ID_EFFECT_SPEED, out, ..] => *out = l.speed(),
            [ID_COLOR, hue, sat, ..] => {
                *hue = l.hue();
                *sat = l.sat();
            }
            _ => {}
        }
    }

    fn save<S: ConfigStore>(&mut self, layer: u8, store: &mut S) -> Result<(), StorageError> {
        if layer >= self.layer_count {
            warn!("no lighting slot for layer {}", layer);
            return Err(StorageError::OutOfRange);
        }
        store.write_layer_word(layer, self.lighting.config_word())?;
        self.lighting.persist();
        debug!("lighting saved for layer {}", layer);
        Ok(())
    }

    /// Restore the lighting saved for the new highest layer, if any.
    pub fn on_layer_change<S: ConfigStore>(&mut self, layer_state: u32, store: &mut S) {
        let layer = highest_layer(layer_state);
        if layer >= self.layer_count {
            return;
        }
        if let Some(raw) = store.read_layer_word(layer) {
            self.lighting.apply_config_word(raw);
        }
    }
}
