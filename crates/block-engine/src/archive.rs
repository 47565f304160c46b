use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::types::BlockCollection;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes the regenerated program and a block digest into a zip archive
#[derive(Debug, Clone, Default)]
pub struct Packager {
    config: ArchiveConfig,
}

impl Packager {
    #[must_use]
    pub const fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    /// Build the archive in memory; the returned buffer is rewound
    pub fn create_archive(
        &self,
        main_text: &str,
        blocks: &BlockCollection,
    ) -> Result<Cursor<Vec<u8>>> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(self.config.compression_level)));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        writer.start_file(self.config.main_member.as_str(), options)?;
        writer.write_all(main_text.as_bytes())?;

        writer.start_file(self.config.summary_member.as_str(), options)?;
        writer.write_all(build_summary(blocks).as_bytes())?;

        let mut buffer = writer.finish()?;
        buffer.set_position(0);

        log::debug!(
            "Archive written: {} bytes, {} blocks summarized",
            buffer.get_ref().len(),
            blocks.len()
        );
        Ok(buffer)
    }
}

/// Per-block digest: a `### name` heading, the source and a blank line
pub fn build_summary(blocks: &BlockCollection) -> String {
    let mut summary = String::new();
    for block in blocks {
        summary.push_str("### ");
        summary.push_str(&block.name);
        summary.push('\n');
        summary.push_str(&block.source);
        summary.push_str("\n\n");
    }
    summary
}
