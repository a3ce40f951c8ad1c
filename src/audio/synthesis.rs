//! Procedural demo music for running without media.

use glicol::Engine;

use crate::error::{Result, VisynthError};
use crate::params::audio_constants::BLOCK_SIZE;

/// Glicol composition: gated saw lead through a swept low-pass
pub const GLICOL_COMPOSITION: &str = r#"
~gate: speed 2.0 >> seq 60 _60 _~a 48
~a: choose 48 48 48 72 0 0 0
~amp: ~gate >> envperc 0.001 0.1
~pit: ~gate >> mul 261.63
~lead: saw ~pit >> mul ~amp >> lpf ~mod 5.0 >> mul 0.1
~mod: sin 0.2 >> mul 1300 >> add 1500
o: ~lead >> plate 0.1
"#;

/// Build a running engine for `composition` at `sample_rate`
pub fn build_engine(composition: &str, sample_rate: usize) -> Result<Engine<BLOCK_SIZE>> {
    let mut engine = Engine::<BLOCK_SIZE>::new();
    engine.set_sr(sample_rate);
    engine.update_with_code(composition);
    engine
        .update()
        .map_err(|e| VisynthError::Synth(format!("glicol engine init failed: {:?}", e)))?;
    Ok(engine)
}
