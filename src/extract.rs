use chrono::NaiveDate;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{Entity, FilingDescriptor};
use crate::edgar::report::FormType;

/// Unpacks downloaded XBRL packages into the filing tree
/// `<root>/<ticker>/<form>/[<FORM>][<date>][<ticker>].<ext>`.
#[derive(Debug, Clone)]
pub struct PackageExtractor {
    root: PathBuf,
    member_extension: String,
    output_extension: String,
}

impl PackageExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            member_extension: "xml".to_string(),
            output_extension: "xbrl".to_string(),
        }
    }

    pub fn with_extensions(mut self, member: &str, output: &str) -> Self {
        self.member_extension = member.trim_start_matches('.').to_lowercase();
        self.output_extension = output.trim_start_matches('.').to_string();
        self
    }

    pub fn destination_dir(&self, entity: &Entity, form_type: FormType) -> PathBuf {
        self.root.join(&entity.ticker).join(form_type.dir_name())
    }

    pub fn document_name(
        &self,
        form_type: FormType,
        report_date: NaiveDate,
        ticker: &str,
    ) -> String {
        format!(
            "[{}][{}][{}].{}",
            form_type,
            report_date.format("%Y-%m-%d"),
            ticker,
            self.output_extension
        )
    }

    /// Writes `package` next to its destination, extracts every matching
    /// member onto the deterministic document name and removes the package.
    /// The package file is removed whether or not extraction succeeds.
    pub fn extract(
        &self,
        package: &[u8],
        entity: &Entity,
        filing: &FilingDescriptor,
    ) -> PipelineResult<PathBuf> {
        let accession = filing.accession_number.as_str();
        let dest = self.destination_dir(entity, filing.form_type);
        fs::create_dir_all(&dest).map_err(|e| PipelineError::extraction(accession, e))?;

        let package_path = dest.join(format!("{}-xbrl.zip", accession));
        let result = fs::write(&package_path, package)
            .map_err(|e| PipelineError::extraction(accession, e))
            .and_then(|_| self.unpack(&package_path, &dest, entity, filing));

        if package_path.exists() {
            if let Err(e) = fs::remove_file(&package_path) {
                warn!("Could not remove package {:?}: {}", package_path, e);
            }
        }

        result
    }

    fn unpack(
        &self,
        package_path: &Path,
        dest: &Path,
        entity: &Entity,
        filing: &FilingDescriptor,
    ) -> PipelineResult<PathBuf> {
        let accession = filing.accession_number.as_str();
        let file = File::open(package_path).map_err(|e| PipelineError::extraction(accession, e))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| PipelineError::extraction(accession, e))?;

        let suffix = format!(".{}", self.member_extension);
        let target = dest.join(self.document_name(
            filing.form_type,
            filing.report_date,
            &entity.ticker,
        ));
        let mut extracted = 0usize;

        for i in 0..archive.len() {
            let mut member = archive
                .by_index(i)
                .map_err(|e| PipelineError::extraction(accession, e))?;
            if member.is_dir() || !member.name().to_lowercase().ends_with(&suffix) {
                continue;
            }
            let Some(file_name) = member
                .enclosed_name()
                .and_then(|p| p.file_name().map(|n| n.to_owned()))
            else {
                warn!("Ignoring package member with unsafe path: {}", member.name());
                continue;
            };

            let staged = dest.join(&file_name);
            debug!("Extracting {} to {:?}", member.name(), staged);
            if let Err(e) = write_member(&mut member, &staged) {
                if staged.exists() {
                    if let Err(e) = fs::remove_file(&staged) {
                        warn!("Could not remove partial member {:?}: {}", staged, e);
                    }
                }
                return Err(PipelineError::extraction(accession, e));
            }

            if target.exists() {
                fs::remove_file(&target).map_err(|e| PipelineError::extraction(accession, e))?;
            }
            fs::rename(&staged, &target).map_err(|e| PipelineError::extraction(accession, e))?;
            extracted += 1;
        }

        if extracted == 0 {
            return Err(PipelineError::extraction(
                accession,
                format!("package has no *{} member", suffix),
            ));
        }

        info!("Extracted {} to {:?}", accession, target);
        Ok(target)
    }
}

fn write_member(member: &mut impl Read, path: &Path) -> io::Result<()> {
    let mut out = File::create(path)?;
    io::copy(member, &mut out)?;
    out.sync_all()
}
