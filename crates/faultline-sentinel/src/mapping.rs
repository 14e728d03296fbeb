//! ---
//! fl_section: "06-dependency-sentinel"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Dependency sentinel: import scanning and manifest reconciliation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Curated import-name → distribution table.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

/// Installable package resolved for an import name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRequirement {
    pub module: String,
    pub package: String,
    pub min_version: Option<String>,
    /// `false` when the name fell back to identity mapping.
    pub curated: bool,
}

impl PackageRequirement {
    /// Manifest line for this package (`name>=version` or bare `name`).
    pub fn requirement_line(&self) -> String {
        match &self.min_version {
            Some(version) => format!("{}>={}", self.package, version),
            None => self.package.clone(),
        }
    }
}

static CURATED: Lazy<HashMap<&'static str, (&'static str, Option<&'static str>)>> =
    Lazy::new(|| {
        HashMap::from([
            ("yaml", ("PyYAML", Some("6.0"))),
            ("PIL", ("Pillow", Some("10.0"))),
            ("cv2", ("opencv-python", Some("4.8"))),
            ("sklearn", ("scikit-learn", Some("1.3"))),
            ("skimage", ("scikit-image", Some("0.21"))),
            ("bs4", ("beautifulsoup4", Some("4.12"))),
            ("dateutil", ("python-dateutil", Some("2.8"))),
            ("dotenv", ("python-dotenv", Some("1.0"))),
            ("jwt", ("PyJWT", Some("2.8"))),
            ("psycopg2", ("psycopg2-binary", Some("2.9"))),
            ("MySQLdb", ("mysqlclient", Some("2.2"))),
            ("Crypto", ("pycryptodome", Some("3.19"))),
            ("OpenSSL", ("pyOpenSSL", Some("23.2"))),
            ("magic", ("python-magic", Some("0.4"))),
            ("serial", ("pyserial", Some("3.5"))),
            ("usb", ("pyusb", Some("1.2"))),
            ("zmq", ("pyzmq", Some("25.1"))),
            ("docx", ("python-docx", Some("1.1"))),
            ("pptx", ("python-pptx", Some("0.6"))),
            ("fitz", ("PyMuPDF", Some("1.23"))),
            ("attr", ("attrs", Some("23.1"))),
            ("google", ("protobuf", Some("4.24"))),
            ("jose", ("python-jose", Some("3.3"))),
            ("multipart", ("python-multipart", Some("0.0.6"))),
            ("requests", ("requests", Some("2.31"))),
            ("httpx", ("httpx", Some("0.25"))),
            ("flask", ("Flask", Some("3.0"))),
            ("fastapi", ("fastapi", Some("0.104"))),
            ("uvicorn", ("uvicorn", Some("0.24"))),
            ("django", ("Django", Some("4.2"))),
            ("pydantic", ("pydantic", Some("2.5"))),
            ("sqlalchemy", ("SQLAlchemy", Some("2.0"))),
            ("numpy", ("numpy", Some("1.26"))),
            ("pandas", ("pandas", Some("2.1"))),
            ("scipy", ("scipy", Some("1.11"))),
            ("matplotlib", ("matplotlib", Some("3.8"))),
            ("redis", ("redis", Some("5.0"))),
            ("celery", ("celery", Some("5.3"))),
            ("pytest", ("pytest", Some("7.4"))),
            ("psutil", ("psutil", Some("5.9"))),
            ("jinja2", ("Jinja2", Some("3.1"))),
            ("click", ("click", Some("8.1"))),
            ("boto3", ("boto3", Some("1.28"))),
        ])
    });

/// Resolve `module` to an installable package.
///
/// Names absent from the curated table map to themselves with no minimum version.
pub fn resolve_package(module: &str) -> PackageRequirement {
    match CURATED.get(module) {
        Some((package, version)) => PackageRequirement {
            module: module.to_owned(),
            package: (*package).to_owned(),
            min_version: version.map(str::to_owned),
            curated: true,
        },
        None => PackageRequirement {
            module: module.to_owned(),
            package: module.to_owned(),
            min_version: None,
            curated: false,
        },
    }
}
