//! Renders the provisioner's declarative config into a VM's directory.
//!
//! Copies the auxiliary template files alongside a `Vagrantfile` produced by
//! substituting `{{id}}`, `{{hostname}}` and `{{ip}}` into
//! `Vagrantfile.tmpl`. Rendering must succeed before `up` is attempted.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

const TEMPLATE_FILE: &str = "Vagrantfile.tmpl";
const OUTPUT_FILE: &str = "Vagrantfile";

/// The facts a rendered config is derived from.
#[derive(Debug, Clone)]
pub struct VmFacts {
    pub id: i64,
    pub hostname: String,
    pub ip: String,
}

#[derive(Clone)]
pub struct VagrantfileRenderer {
    templates_dir: PathBuf,
}

impl VagrantfileRenderer {
    #[must_use]
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn render(&self, facts: &VmFacts, target_dir: &Path) -> Result<()> {
        let template_path = self.templates_dir.join(TEMPLATE_FILE);
        if !template_path.is_file() {
            return Err(Error::not_found(
                "provisioner template",
                template_path.display(),
            ));
        }

        self.copy_auxiliary_files(target_dir)?;

        let template = std::fs::read_to_string(&template_path)?;
        let rendered = substitute(&template, facts);
        std::fs::write(target_dir.join(OUTPUT_FILE), rendered)?;

        Ok(())
    }

    fn copy_auxiliary_files(&self, target_dir: &Path) -> Result<()> {
        for entry in WalkDir::new(&self.templates_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() || entry.file_name().to_str() == Some(TEMPLATE_FILE) {
                continue;
            }
            std::fs::copy(entry.path(), target_dir.join(entry.file_name()))?;
        }

        Ok(())
    }
}

fn substitute(template: &str, facts: &VmFacts) -> String {
    template
        .replace("{{id}}", &facts.id.to_string())
        .replace("{{hostname}}", &facts.hostname)
        .replace("{{ip}}", &facts.ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> VmFacts {
        VmFacts {
            id: 80,
            hostname: "nyc-vm-d80".to_string(),
            ip: "10.20.6.110".to_string(),
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let rendered = substitute(
            "host = {{hostname}}\nip = {{ip}}\nid = {{id}}\n",
            &facts(),
        );
        assert_eq!(rendered, "host = nyc-vm-d80\nip = 10.20.6.110\nid = 80\n");
    }

    #[test]
    fn renders_into_target_and_copies_auxiliary_files() {
        let templates = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        std::fs::write(
            templates.path().join(TEMPLATE_FILE),
            "hostname {{hostname}}",
        )
        .unwrap();
        std::fs::write(templates.path().join("bootstrap.sh"), "#!/bin/sh\n").unwrap();

        let renderer = VagrantfileRenderer::new(templates.path());
        renderer.render(&facts(), target.path()).unwrap();

        let vagrantfile = std::fs::read_to_string(target.path().join(OUTPUT_FILE)).unwrap();
        assert_eq!(vagrantfile, "hostname nyc-vm-d80");
        assert!(target.path().join("bootstrap.sh").is_file());
        assert!(!target.path().join(TEMPLATE_FILE).exists());
    }

    #[test]
    fn missing_template_is_not_found() {
        let templates = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        let renderer = VagrantfileRenderer::new(templates.path());
        let err = renderer.render(&facts(), target.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
