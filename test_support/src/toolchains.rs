//! Toolchain fixtures.

use tsugite::toolchain::{CompilerFamily, LanguageToolchain, Toolchain};

/// GNU C compiler handling `.c` files.
#[must_use]
pub fn gnu_c() -> LanguageToolchain {
    LanguageToolchain {
        extensions: vec!["c".into()],
        ..LanguageToolchain::new("/usr/bin/cc", CompilerFamily::Gnu)
    }
}

/// GNU C++ compiler handling `.cpp` and `.cc` files.
#[must_use]
pub fn gnu_cxx() -> LanguageToolchain {
    LanguageToolchain {
        extensions: vec!["cpp".into(), "cc".into()],
        ..LanguageToolchain::new("/usr/bin/c++", CompilerFamily::Gnu)
    }
}

/// gfortran with module scanning configured.
#[must_use]
pub fn gfortran() -> LanguageToolchain {
    LanguageToolchain {
        extensions: vec!["f90".into(), "F90".into()],
        scan_command: Some("fscan $in -o $DYNDEP_INTERMEDIATE_FILE".into()),
        collate_command: Some("fcollate --dd $out $in".into()),
        ..LanguageToolchain::new("/usr/bin/gfortran", CompilerFamily::Gnu)
    }
}

/// MSVC C++ compiler.
#[must_use]
pub fn msvc_cxx() -> LanguageToolchain {
    LanguageToolchain {
        extensions: vec!["cpp".into()],
        ..LanguageToolchain::new("cl.exe", CompilerFamily::Msvc)
    }
}

/// C, C++ and Fortran with GNU compilers.
#[must_use]
pub fn gnu() -> Toolchain {
    Toolchain::default()
        .with_language("C", gnu_c())
        .with_language("CXX", gnu_cxx())
        .with_language("Fortran", gfortran())
}
