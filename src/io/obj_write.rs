//! Wavefront OBJ dump of a photon cloud.
//!
//! Emits one vertex per stored photon plus degenerate triangle fans so that
//! importers which insist on faces (e.g. Blender) still accept the file.
//! Diagnostic only; the output is not covered by the map's invariants.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::map::PhotonMap;

pub fn dump_obj<P: AsRef<Path>>(map: &PhotonMap, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);

    writeln!(w, "o Photons")?;
    for i in 1..=map.photon_count() {
        let p = map.photon(i).position();
        writeln!(w, "v {} {} {}", p.x, p.y, p.z)?;
    }

    // Fake geometry over consecutive vertices so point-only files import
    for i in 3..=map.photon_count() {
        writeln!(w, "f {} {} {}", i, i - 1, i - 2)?;
    }

    w.flush()?;
    Ok(())
}
