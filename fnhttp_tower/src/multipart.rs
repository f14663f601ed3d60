use std::convert::Infallible;

use bytes::Bytes;
use fnhttp::{Form, FormFile};

pub(crate) const MULTIPART_FORM: &str = "multipart/form-data";

/// Reads every field of a `multipart/form-data` body
///
/// Parts with a file name become [`FormFile`]s; all others are text fields.
pub(crate) async fn parse_form(content_type: &str, body: Bytes) -> Result<Form, multer::Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();

        match field.file_name().map(ToOwned::to_owned) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                tracing::trace!(field = %name, size = data.len(), "multipart file read");
                form.push_file(FormFile {
                    name,
                    file_name: Some(file_name),
                    content_type,
                    data,
                });
            }
            None => {
                let value = field.text().await?;
                form.push_field(name, value);
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn body() -> Bytes {
        Bytes::from(
            [
                "--X-BOUNDARY\r\n",
                "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
                "Quarterly report\r\n",
                "--X-BOUNDARY\r\n",
                "Content-Disposition: form-data; name=\"attachment\"; filename=\"q3.csv\"\r\n",
                "Content-Type: text/csv\r\n\r\n",
                "a,b\n1,2\r\n",
                "--X-BOUNDARY--\r\n",
            ]
            .concat(),
        )
    }

    #[tokio::test]
    async fn fields_and_files_are_separated() {
        let form = parse_form(&format!("{MULTIPART_FORM}; boundary={BOUNDARY}"), body())
            .await
            .unwrap();

        assert_eq!(
            form.field_values("title"),
            Some(vec!["Quarterly report".to_owned()])
        );

        let file = form.file("attachment").unwrap();
        assert_eq!(file.file_name.as_deref(), Some("q3.csv"));
        assert_eq!(file.content_type.as_deref(), Some("text/csv"));
        assert_eq!(file.data, "a,b\n1,2");
    }

    #[tokio::test]
    async fn missing_boundary_is_an_error() {
        assert!(parse_form(MULTIPART_FORM, body()).await.is_err());
    }
}
