use std::fs::File;
use std::io::BufRead;

use crate::error::TraceError;

/// Opens a trace file for line by line reading
pub fn get_reader(file: File) -> Result<impl BufRead, TraceError> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        // Traces are text, a few pages at a time is plenty
        const BUFFER_SIZE: usize = 16 * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        use std::io::Cursor;
        // The mapping is only read, and the trace isn't expected to change while it is simulated
        unsafe {
            let m = Mmap::map(&file)?;
            m.advise(Advice::Sequential)?;
            Ok(Cursor::new(m))
        }
    }
}
