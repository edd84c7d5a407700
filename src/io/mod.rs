//! Image I/O collaborators: the binary netpbm formats.

mod netpbm;

pub use netpbm::{
    load_pgm_u16, load_pgm_u8, load_ppm, save_pgm_u16, save_pgm_u8, save_ppm, RgbImage,
};
