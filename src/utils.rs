/// Splits a file name at its last `.`, keeping the dot on the extension.
///
/// `"IMG_1.jpg"` gives `("IMG_1", ".jpg")`, `"README"` gives `("README", "")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// Lowercased extension including the dot, or an empty string.
pub fn lowercase_extension(name: &str) -> String {
    split_extension(name).1.to_lowercase()
}

#[cfg(test)]
pub mod test_helpers {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;

    pub const COMPANION_JSON: &str =
        r#"{"title": "test.jpg", "photoTakenTime": {"timestamp": "1672531200"}}"#;

    /// Creates every name in `dir`; `.json` names get companion content, the rest a placeholder.
    pub fn write_files(dir: &Path, names: &[&str]) -> std::io::Result<()> {
        for name in names {
            let content = if name.ends_with(".json") {
                COMPANION_JSON
            } else {
                "test"
            };
            fs::write(dir.join(name), content)?;
        }
        Ok(())
    }

    /// Minimal stand-in for `exiftool -stay_open True -@ -`.
    ///
    /// Reads answer with a one-element JSON array echoing the requested path; paths containing
    /// `nodate` carry no date tags and paths containing `missing` produce no output at all and
    /// paths containing `latin` carry a Latin-1 encoded title and paths containing `scalar` answer
    /// with a bare string instead of a tag object.
    /// Writes answer with an update line, or a warning for paths containing `warn`.
    const FAKE_EXIFTOOL: &str = r#"#!/bin/sh
target=""
write=""
stopping=""
while IFS= read -r line; do
    case "$line" in
        -execute*)
            if [ -n "$stopping" ]; then
                exit 0
            fi
            if [ -n "$write" ]; then
                case "$target" in
                    *warn*) echo "Warning: [minor] Fake warning - $target" ;;
                    *) echo "    1 image files updated" ;;
                esac
            else
                case "$target" in
                    *missing*) echo "Error: File not found - $target" >&2 ;;
                    *scalar*) printf '["%s"]\n' "$target" ;;
                    *latin*) printf '[{\n  "SourceFile": "%s",\n  "Title": "caf\351"\n}]\n' "$target" ;;
                    *nodate*) printf '[{\n  "SourceFile": "%s",\n  "FileName": "%s"\n}]\n' "$target" "${target##*/}" ;;
                    *) printf '[{\n  "SourceFile": "%s",\n  "FileName": "%s",\n  "DateTimeOriginal": "2021:06:01 10:00:00",\n  "ImageWidth": 640\n}]\n' "$target" "${target##*/}" ;;
                esac
            fi
            echo "{ready}"
            target=""
            write=""
            ;;
        -stay_open) ;;
        False) stopping=1 ;;
        -AllDates=*) write=1 ;;
        -*) ;;
        *) target="$line" ;;
    esac
done
"#;

    /// Never answers and ignores the shutdown directive.
    const HUNG_EXIFTOOL: &str = "#!/bin/sh\nexec sleep 30\n";

    fn write_script(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        fs::write(&path, body)?;
        Ok(path)
    }

    pub fn fake_exiftool(dir: &Path) -> std::io::Result<PathBuf> {
        write_script(dir, "fake-exiftool.sh", FAKE_EXIFTOOL)
    }

    pub fn hung_exiftool(dir: &Path) -> std::io::Result<PathBuf> {
        write_script(dir, "hung-exiftool.sh", HUNG_EXIFTOOL)
    }

    /// Runs a script through `sh` so it never has to be marked executable.
    pub fn sh(script: &Path) -> Command {
        let mut command = Command::new("sh");
        command.arg(script);
        command
    }
}
