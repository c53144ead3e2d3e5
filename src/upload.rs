use crate::http::Bytes;

use std::slice;

/// Files uploaded through a `multipart/form-data` request.
///
/// Declaring a handler parameter of this type makes the request body be
/// parsed as multipart form data. Each form field holds a single value;
/// when a field name repeats, the entry keeps its first position and
/// takes the last value.
///
/// An upload is "falsy" when no file was sent, see [`UploadFile::is_empty`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UploadFile {
    files: Vec<(String, Bytes)>,
}

impl UploadFile {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no file was uploaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The number of uploaded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// The bytes uploaded under the given field name.
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, data)| data)
    }

    /// Returns `true` if a file was uploaded under the given field name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The field names of every uploaded file, in upload order.
    pub fn keys(&self) -> Vec<&str> {
        self.files.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate over `(field name, bytes)` pairs in upload order.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.files.iter())
    }

    /// Add a file, replacing the value of an existing field.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Bytes>) {
        let name = name.into();
        let data = data.into();

        match self.files.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = data,
            None => self.files.push((name, data)),
        }
    }
}

impl<N, D> FromIterator<(N, D)> for UploadFile
where
    N: Into<String>,
    D: Into<Bytes>,
{
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (N, D)>,
    {
        let mut files = UploadFile::new();
        for (name, data) in iter {
            files.insert(name, data);
        }
        files
    }
}

/// An iterator over the files of an [`UploadFile`].
pub struct Iter<'a>(slice::Iter<'a, (String, Bytes)>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(name, data)| (name.as_str(), data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> IntoIterator for &'a UploadFile {
    type Item = (&'a str, &'a Bytes);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
