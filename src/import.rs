use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{
    error::ValidationError,
    models::{AddUserRequest, NewUser},
};

/// Columns a user upload must carry, in any order. Extra columns are ignored.
pub const USER_COLUMNS: [&str; 5] = ["ssn", "name", "email", "address", "date_of_birth"];

/// Name of the table a bulk upload writes to, as shown in the upload confirmation.
pub const USER_TABLE_LABEL: &str = "User";

/// check_upload_name
///
/// Accepts `.csv` files only. Spreadsheet formats get a dedicated message so the
/// admin knows to re-export rather than guess.
pub fn check_upload_name(file_name: &str) -> Result<(), ValidationError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(ValidationError::new("No selected file"));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => Ok(()),
        "xlsx" | "xls" => Err(ValidationError::new(
            "Spreadsheet uploads are not supported. Save the sheet as CSV and upload again.",
        )),
        _ => Err(ValidationError::new("Allowed file types are CSV")),
    }
}

fn column_index(headers: &StringRecord) -> Result<HashMap<String, usize>, ValidationError> {
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect();

    let missing: Vec<&str> = USER_COLUMNS
        .iter()
        .copied()
        .filter(|column| !index.contains_key(*column))
        .collect();

    if missing.is_empty() {
        return Ok(index);
    }

    let mut unexpected: Vec<&str> = index
        .keys()
        .map(String::as_str)
        .filter(|name| !USER_COLUMNS.contains(name))
        .collect();
    unexpected.sort_unstable();

    let mut message = format!(
        "CSV columns do not match the '{}' table. Missing: {}.",
        USER_TABLE_LABEL,
        missing.join(", ")
    );
    if !unexpected.is_empty() {
        message.push_str(&format!(" Unexpected: {}.", unexpected.join(", ")));
    }
    Err(ValidationError::new(message))
}

fn field(record: &StringRecord, index: &HashMap<String, usize>, column: &str) -> String {
    index
        .get(column)
        .and_then(|&i| record.get(i))
        .unwrap_or_default()
        .to_string()
}

/// parse_user_csv
///
/// Reads a user upload into validated rows. The whole file is rejected on the first
/// bad row; messages name the row as the admin sees it in a spreadsheet (header = row 1).
pub fn parse_user_csv(bytes: &[u8]) -> Result<Vec<NewUser>, ValidationError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ValidationError::new(format!("Could not read CSV header: {}", e)))?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ValidationError::new("File is empty."));
    }
    let index = column_index(&headers)?;

    let mut users = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record =
            record.map_err(|e| ValidationError::new(format!("Row {}: {}", row, e)))?;

        let address = field(&record, &index, "address");
        let request = AddUserRequest {
            ssn: field(&record, &index, "ssn"),
            name: field(&record, &index, "name"),
            email: field(&record, &index, "email"),
            address: Some(address),
            date_of_birth: field(&record, &index, "date_of_birth"),
        };

        let user = request
            .validate()
            .map_err(|e| ValidationError::new(format!("Row {}: {}", row, e)))?;
        users.push(user);
    }

    if users.is_empty() {
        return Err(ValidationError::new("File is empty."));
    }

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_name_rules() {
        assert!(check_upload_name("users.csv").is_ok());
        assert!(check_upload_name("USERS.CSV").is_ok());
        assert_eq!(
            check_upload_name("").unwrap_err().0,
            "No selected file"
        );
        assert!(check_upload_name("users.xlsx").unwrap_err().0.contains("CSV"));
        assert_eq!(
            check_upload_name("notes.txt").unwrap_err().0,
            "Allowed file types are CSV"
        );
    }

    #[test]
    fn test_parse_valid_file_any_column_order() {
        let csv = "name,ssn,email,date_of_birth,address\n\
                   Ana,1001,ana@uni.test,2001-04-02,Main St 1\n\
                   Ben,1002,ben@uni.test,2000-12-30,\n";

        let users = parse_user_csv(csv.as_bytes()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].ssn, "1001");
        assert_eq!(users[0].address.as_deref(), Some("Main St 1"));
        assert_eq!(users[1].address, None);
    }

    #[test]
    fn test_missing_columns_are_named() {
        let csv = "ssn,name,mail\n1,Ana,a@b.c\n";
        let err = parse_user_csv(csv.as_bytes()).unwrap_err();
        assert!(err.0.contains("Missing: email, address, date_of_birth."));
        assert!(err.0.contains("Unexpected: mail."));
    }

    #[test]
    fn test_bad_row_reports_row_number() {
        let csv = "ssn,name,email,address,date_of_birth\n\
                   1,Ana,a@b.c,,2001-01-01\n\
                   2,Ben,b@b.c,,01/02/2001\n";
        let err = parse_user_csv(csv.as_bytes()).unwrap_err();
        assert!(err.0.starts_with("Row 3:"), "got {}", err.0);
    }

    #[test]
    fn test_header_only_is_empty() {
        let err = parse_user_csv(b"ssn,name,email,address,date_of_birth\n").unwrap_err();
        assert_eq!(err.0, "File is empty.");
        assert_eq!(parse_user_csv(b"").unwrap_err().0, "File is empty.");
    }
}
