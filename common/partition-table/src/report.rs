// Licensed under the Apache-2.0 license

use core::fmt;

use crate::table::PartitionTableStorage;

const INDENT: &str = "                         ";

/// Condensed human-readable view of a stored partition table.
///
/// The checksum is printed as stored; it is not recomputed.
pub struct Report<'a>(pub &'a PartitionTableStorage);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = self.0;
        let table = storage.table();
        writeln!(f, "Partition Table Storage")?;
        writeln!(f, "  Partition Table")?;
        writeln!(f, "    Header")?;
        writeln!(f, "      Version          : {}", table.version)?;

        for (i, app) in table.preloaded_app.iter().enumerate() {
            writeln!(f, "    Preloaded App {i}")?;
            writeln!(f, "      Size             : {}", app.size)?;
            write_rows(f, "      Digest           : ", &app.digest)?;
            write_rows(f, "      Signature        : ", &app.signature)?;
            if storage.generation().has_pubkey() {
                write_rows(f, "      Pubkey           : ", &app.pubkey)?;
            }
        }
        writeln!(
            f,
            "  Digest               : {}",
            hex::encode(storage.checksum().as_bytes())
        )
    }
}

// One row of hex per 16 bytes, continuation rows aligned under the first.
fn write_rows(f: &mut fmt::Formatter<'_>, label: &str, bytes: &[u8]) -> fmt::Result {
    for (i, row) in bytes.chunks(16).enumerate() {
        let prefix = if i == 0 { label } else { INDENT };
        writeln!(f, "{prefix}{}", hex::encode(row))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Generation;
    use crate::table::PartitionTableBuilder;

    #[test]
    fn test_report_signed() {
        let storage = PartitionTableBuilder::new(Generation::Signed)
            .app0(&[0u8; 10])
            .unwrap()
            .app1_signature([0xab; 64])
            .build();
        let report = Report(&storage).to_string();
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "Partition Table Storage");
        assert_eq!(lines[3], "      Version          : 1");
        assert_eq!(lines[4], "    Preloaded App 0");
        assert_eq!(lines[5], "      Size             : 10");
        assert_eq!(
            lines[6],
            format!("      Digest           : {}", "00".repeat(16))
        );
        assert_eq!(lines[7], format!("{INDENT}{}", "00".repeat(16)));
        // Version + per-app (header, size, 2 digest, 4 signature, 2 pubkey) + checksum.
        assert_eq!(lines.len(), 4 + 2 * 10 + 1);
        assert!(report.contains(&format!("      Signature        : {}", "ab".repeat(16))));
        assert!(report.contains(&format!("      Pubkey           : {}", "55".repeat(16))));
        assert_eq!(
            *lines.last().unwrap(),
            format!(
                "  Digest               : {}",
                hex::encode(storage.checksum().as_bytes())
            )
        );
    }

    #[test]
    fn test_report_without_pubkey() {
        let storage = PartitionTableBuilder::new(Generation::Legacy).build();
        let report = Report(&storage).to_string();
        assert!(!report.contains("Pubkey"));
        assert_eq!(report.lines().count(), 4 + 2 * 8 + 1);
        // 16-byte checksum renders as 32 hex digits.
        assert_eq!(report.lines().last().unwrap().len(), 25 + 32);
    }
}
